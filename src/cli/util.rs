use crate::import::ImportFormat;

/// `--format` value; anything unrecognised falls back to detection.
pub fn parse_import_format(s: Option<&str>) -> ImportFormat {
    match s.map(str::to_ascii_lowercase).as_deref() {
        Some("ndjson" | "jsonl") => ImportFormat::Ndjson,
        Some("json" | "array") => ImportFormat::JsonArray,
        _ => ImportFormat::Auto,
    }
}
