//! Format detection heuristics for import.

use std::io::{self, BufRead};
use std::path::Path;

use super::ImportFormat;

/// `.ndjson`/`.jsonl` are line-delimited; anything else is decided by peeking at the content.
///
/// # Errors
/// Returns read errors from the underlying reader.
pub fn detect_format<R: BufRead>(reader: &mut R, path: &Path) -> io::Result<ImportFormat> {
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        match ext.to_lowercase().as_str() {
            "jsonl" | "ndjson" => return Ok(ImportFormat::Ndjson),
            _ => {}
        }
    }
    detect_content(reader)
}

/// A leading `[` means a JSON array; otherwise the input is read as NDJSON.
///
/// # Errors
/// Returns read errors from the underlying reader.
pub fn detect_content<R: BufRead>(reader: &mut R) -> io::Result<ImportFormat> {
    // peek without consuming
    let buf = reader.fill_buf()?;
    let head = String::from_utf8_lossy(&buf[..buf.len().min(256)]);
    if head.trim_start().starts_with('[') {
        Ok(ImportFormat::JsonArray)
    } else {
        Ok(ImportFormat::Ndjson)
    }
}
