//! Utility functions that may be helpful for implementing
//! and testing MapReduce.
//!

use anyhow::Result;
use bytes::Bytes;

/// Read an entire [`Bytes`] slice into a [`String`].
///
/// Note that the entire slice will be read into the string.
/// It is the caller's responsibility to ensure the slice is
/// of the correct length. Failure to do so may result in
/// an error being returned, or the string data being incorrect.
///
/// Returns an error if the slice contains invalid UTF-8.
pub fn string_from_bytes(buf: Bytes) -> Result<String> {
    Ok(String::from_utf8(buf.as_ref().into())?)
}

/// Convert a [`String`] to [`Bytes`].
#[inline]
pub fn string_to_bytes(s: String) -> Bytes {
    Bytes::from(s)
}

/// Encodes a byte offset the way map input keys carry it.
#[inline]
pub fn offset_to_bytes(offset: u64) -> Bytes {
    Bytes::copy_from_slice(&offset.to_be_bytes())
}

/// Strips one trailing `\n`, `\r`, or `\r\n` from a line.
pub fn trim_line_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_unix_and_dos_endings() {
        assert_eq!(trim_line_terminator(b"cat\n"), b"cat");
        assert_eq!(trim_line_terminator(b"cat\r\n"), b"cat");
        assert_eq!(trim_line_terminator(b"cat\r"), b"cat");
        assert_eq!(trim_line_terminator(b"cat"), b"cat");
        assert_eq!(trim_line_terminator(b"\n"), b"");
    }

    #[test]
    fn string_from_bytes_rejects_invalid_utf8() {
        assert!(string_from_bytes(Bytes::from_static(&[0xff, 0xfe])).is_err());
        assert_eq!(
            string_from_bytes(string_to_bytes("dog".into())).unwrap(),
            "dog"
        );
    }
}
