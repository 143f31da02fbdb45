//! A MapReduce-compatible anagram sorter.
//!
//! Two stages:
//!
//! * `assemble` maps each word to `(signature, word)`, joins the words of a
//!   signature into one space-separated group (per split as a combiner, then
//!   again in the reducer), and re-keys every group to [`PLACEHOLDER_KEY`].
//! * `rank` funnels all groups to a single reducer which orders them by
//!   descending word count.

use std::cmp::Reverse;

use crate::*;
use anyhow::{Context, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// The synthetic key every assembled group is re-keyed under, so that the
/// ranking stage sees all groups in one reduce call.
pub const PLACEHOLDER_KEY: &[u8] = b"";

/// Separates words inside a group.
pub const WORD_SEPARATOR: u8 = b' ';

/// Separates groups in the ranked output.
pub const GROUP_SEPARATOR: u8 = b'\n';

/// The stages of the anagram job, in execution order.
pub fn pipeline() -> Vec<Workload> {
    vec![assemble_stage(), rank_stage()]
}

pub fn assemble_stage() -> Workload {
    Workload {
        name: "assemble",
        map_fn: map,
        combine_fn: Some(combine),
        reduce_fn: reduce_groups,
        partitioning: Partitioning::Hashed,
    }
}

pub fn rank_stage() -> Workload {
    Workload {
        name: "rank",
        map_fn: passthrough,
        combine_fn: None,
        reduce_fn: rank,
        partitioning: Partitioning::Single,
    }
}

/// The word's characters sorted by code point.
pub fn signature(word: &str) -> String {
    let mut chars = word.chars().collect::<Vec<_>>();
    chars.sort_unstable();
    chars.into_iter().collect()
}

/// Emits `(signature, word)` for the word carried in the record's value.
pub fn map(kv: KeyValue) -> MapOutput {
    let word = utils::string_from_bytes(kv.value()).context("input line is not valid UTF-8")?;
    let key = utils::string_to_bytes(signature(&word));

    Ok(Box::new(std::iter::once(Ok(KeyValue::new(key, kv.value)))))
}

/// Joins words, or partial groups, with single spaces in arrival order.
///
/// Joining is associative, so running this over partial groups of the same
/// signature gives the same multiset of words as one pass over all of them.
pub fn assemble(values: Box<dyn Iterator<Item = Bytes> + '_>) -> Bytes {
    let mut writer = BytesMut::new();
    for (i, value) in values.enumerate() {
        if i > 0 {
            writer.put_u8(WORD_SEPARATOR);
        }
        writer.put(value);
    }
    writer.freeze()
}

pub fn combine(_key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
    Ok(assemble(values))
}

/// Final assembly for one signature. The signature is dropped here.
pub fn reduce_groups(_key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<KeyValue> {
    Ok(KeyValue::new(Bytes::from_static(PLACEHOLDER_KEY), assemble(values)))
}

pub fn passthrough(kv: KeyValue) -> MapOutput {
    Ok(Box::new(std::iter::once(Ok(kv))))
}

/// Number of whitespace-separated words in a group string.
pub fn word_count(group: &str) -> usize {
    group.split_whitespace().count()
}

/// Orders every group by descending word count and joins them with newlines.
///
/// The sort is stable, so equal-sized groups keep the order they arrived in.
pub fn rank(key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<KeyValue> {
    let mut groups = values
        .map(|group| -> Result<(usize, Bytes)> {
            let count = word_count(&utils::string_from_bytes(group.clone())?);
            Ok((count, group))
        })
        .collect::<Result<Vec<_>>>()?;
    groups.sort_by_key(|(count, _)| Reverse(*count));

    let mut writer = BytesMut::new();
    for (i, (_, group)) in groups.into_iter().enumerate() {
        if i > 0 {
            writer.put_u8(GROUP_SEPARATOR);
        }
        writer.put(group);
    }

    Ok(KeyValue::new(key, writer.freeze()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(words: &[&str]) -> Box<dyn Iterator<Item = Bytes>> {
        let owned = words
            .iter()
            .map(|w| Bytes::copy_from_slice(w.as_bytes()))
            .collect::<Vec<_>>();
        Box::new(owned.into_iter())
    }

    fn sorted_words(group: &[u8]) -> Vec<String> {
        let mut words = std::str::from_utf8(group)
            .unwrap()
            .split(' ')
            .map(str::to_string)
            .collect::<Vec<_>>();
        words.sort();
        words
    }

    #[test]
    fn signature_sorts_by_code_point() {
        assert_eq!(signature("cat"), "act");
        assert_eq!(signature("tac"), "act");
        assert_eq!(signature("Bab"), "Bab");
        assert_eq!(signature("é a"), " aé");
        assert_eq!(signature(""), "");
    }

    #[test]
    fn anagrams_share_a_signature() {
        assert_eq!(signature("dog"), signature("god"));
        assert_eq!(signature("listen"), signature("silent"));
        assert_ne!(signature("ab"), signature("abc"));
        assert_ne!(signature("aab"), signature("abb"));
    }

    #[test]
    fn map_emits_signature_and_original_word() {
        let kv = KeyValue::new(utils::offset_to_bytes(0), Bytes::from_static(b"god"));
        let out = map(kv).unwrap().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(
            out,
            vec![KeyValue::new(Bytes::from_static(b"dgo"), Bytes::from_static(b"god"))]
        );
    }

    #[test]
    fn map_rejects_invalid_utf8() {
        let kv = KeyValue::new(utils::offset_to_bytes(0), Bytes::from_static(&[0xc3, 0x28]));
        assert!(map(kv).is_err());
    }

    #[test]
    fn combining_partials_matches_single_pass() {
        let key = Bytes::from_static(b"act");
        let whole = reduce_groups(key.clone(), values(&["cat", "act", "tac", "cta"])).unwrap();

        let left = combine(key.clone(), values(&["cat", "act"])).unwrap();
        let right = combine(key.clone(), values(&["tac"])).unwrap();
        let third = combine(key.clone(), values(&["cta"])).unwrap();
        let merged = reduce_groups(key, Box::new(vec![right, third, left].into_iter())).unwrap();

        assert_eq!(whole.key, Bytes::from_static(PLACEHOLDER_KEY));
        assert_eq!(merged.key, Bytes::from_static(PLACEHOLDER_KEY));
        assert_eq!(sorted_words(&whole.value), sorted_words(&merged.value));
    }

    #[test]
    fn combine_keeps_duplicates() {
        let group = combine(Bytes::from_static(b"act"), values(&["cat", "cat"])).unwrap();
        assert_eq!(group, Bytes::from_static(b"cat cat"));
    }

    #[test]
    fn rank_orders_by_descending_word_count() {
        let out = rank(
            Bytes::from_static(PLACEHOLDER_KEY),
            values(&["abc", "ab ba", "x y z w", "q"]),
        )
        .unwrap();
        assert_eq!(out.value, Bytes::from_static(b"x y z w\nab ba\nabc\nq"));
    }

    #[test]
    fn rank_is_stable_for_ties() {
        let out = rank(Bytes::new(), values(&["a", "cat act", "b", "dog god"])).unwrap();
        assert_eq!(out.value, Bytes::from_static(b"cat act\ndog god\na\nb"));
    }

    #[test]
    fn empty_group_counts_zero_words() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count(" "), 0);
        let out = rank(Bytes::new(), values(&["", "a"])).unwrap();
        assert_eq!(out.value, Bytes::from_static(b"a\n"));
    }
}
