use crate::errors::DbError;
use serde_json::Value;
use std::io::{BufRead, Read};

use super::record::RecordSink;

/// One book per line; blank lines are ignored. Records are numbered by line.
pub(super) fn import_ndjson<R: BufRead>(mut reader: R, sink: &mut RecordSink<'_>) -> Result<(), DbError> {
    let mut line_no: usize = 0;
    let mut buf = String::with_capacity(8 * 1024);
    loop {
        buf.clear();
        let n = reader.read_line(&mut buf)?;
        if n == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim();
        if line.is_empty() {
            continue;
        }
        sink.accept(line_no, serde_json::from_str::<Value>(line).map_err(DbError::from))?;
    }
    Ok(())
}

/// The whole input is one JSON array of books. An input that is not an array fails outright.
pub(super) fn import_json_array<R: Read>(mut reader: R, sink: &mut RecordSink<'_>) -> Result<(), DbError> {
    let mut s = String::new();
    reader.read_to_string(&mut s)?;
    let val: Value = serde_json::from_str(&s)?;
    let Value::Array(items) = val else {
        return Err(DbError::QueryError("expected a JSON array of books".into()));
    };
    for (i, v) in items.into_iter().enumerate() {
        sink.accept(i + 1, Ok(v))?;
    }
    Ok(())
}
