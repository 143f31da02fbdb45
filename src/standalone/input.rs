//! Turns the job's input spec into line-aligned splits and reads them.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use glob::glob;
use tracing::debug;

use crate::error::JobError;
use crate::utils::{offset_to_bytes, trim_line_terminator};
use crate::KeyValue;

/// A byte range of one input file, processed by one map task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSplit {
    pub path: PathBuf,
    pub start: u64,
    pub end: u64,
}

/// Files whose names start with `_` or `.` are bookkeeping, not input.
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('_') || name.starts_with('.'))
        .unwrap_or(false)
}

/// Regular, non-hidden files directly inside `dir`. Subdirectories are not read.
fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry_path = entry?.path();
        if entry_path.is_file() && !is_hidden(&entry_path) {
            files.push(entry_path);
        }
    }
    Ok(files)
}

/// Turns glob matches into input files. A matched directory contributes its
/// files, and a failed match fails the whole expansion.
fn expand_matches<E>(
    spec: &str,
    matches: impl IntoIterator<Item = std::result::Result<PathBuf, E>>,
) -> Result<Vec<PathBuf>>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let mut files = Vec::new();
    for matched in matches {
        let path = matched.with_context(|| format!("expanding input pattern `{}`", spec))?;
        if is_hidden(&path) {
            continue;
        }
        if path.is_dir() {
            files.extend(list_dir(&path)?);
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Expands the input spec: a file, a directory of files, or a glob spec.
pub fn resolve_inputs(spec: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(spec);
    let mut files = if path.is_file() {
        vec![path.to_path_buf()]
    } else if path.is_dir() {
        list_dir(path)?
    } else {
        let matches = glob(spec).map_err(|source| JobError::InvalidPattern {
            pattern: spec.to_string(),
            source,
        })?;
        expand_matches(spec, matches)?
    };

    if files.is_empty() {
        return Err(JobError::NoInput(spec.to_string()).into());
    }
    files.sort();
    Ok(files)
}

/// Cuts each file into `split_size` byte ranges. Empty files yield no splits.
pub fn compute_splits(files: &[PathBuf], split_size: u64) -> Result<Vec<InputSplit>> {
    let split_size = split_size.max(1);
    let mut splits = Vec::new();
    for path in files {
        let file_size = fs::metadata(path)
            .with_context(|| format!("reading metadata of {}", path.display()))?
            .len();
        let mut start = 0u64;
        while start < file_size {
            let end = (start + split_size).min(file_size);
            splits.push(InputSplit {
                path: path.clone(),
                start,
                end,
            });
            start = end;
        }
        debug!("{} bytes in {}", file_size, path.display());
    }
    Ok(splits)
}

/// Reads one line into `buf`, terminator included. A line ends at `\n`,
/// `\r`, or `\r\n`. Returns the number of bytes consumed, 0 at end of input.
fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
    let mut consumed = 0;
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(consumed);
        }
        match available.iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(i) => {
                let terminator = available[i];
                buf.extend_from_slice(&available[..=i]);
                reader.consume(i + 1);
                consumed += i + 1;
                if terminator == b'\r' && reader.fill_buf()?.first() == Some(&b'\n') {
                    buf.push(b'\n');
                    reader.consume(1);
                    consumed += 1;
                }
                return Ok(consumed);
            }
            None => {
                let len = available.len();
                buf.extend_from_slice(available);
                reader.consume(len);
                consumed += len;
            }
        }
    }
}

/// Reads the lines belonging to `split` as `(byte offset, line)` records.
///
/// A split that does not begin at offset 0 skips its first line, which the
/// previous split owns. A split owns every line starting at or before its
/// end offset.
pub fn read_split(split: &InputSplit) -> Result<Vec<KeyValue>> {
    let file =
        File::open(&split.path).with_context(|| format!("opening {}", split.path.display()))?;
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(split.start))?;

    let mut pos = split.start;
    let mut buf = Vec::new();
    if split.start > 0 {
        pos += read_line(&mut reader, &mut buf)? as u64;
    }

    let mut records = Vec::new();
    while pos <= split.end {
        buf.clear();
        let size = read_line(&mut reader, &mut buf)?;
        if size == 0 {
            break;
        }
        let line = Bytes::copy_from_slice(trim_line_terminator(&buf));
        records.push(KeyValue::new(offset_to_bytes(pos), line));
        pos += size as u64;
    }
    Ok(records)
}
