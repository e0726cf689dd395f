//! Append-only operation log. Every mutation is written here before it touches memory, and
//! `Database::open` replays the file to rebuild collections and indexes.
//!
//! Framing: `u64` little-endian length, then a bincode (`standard()`) encoded `WalRecord`.
//! Document bodies are raw BSON bytes, so every value type survives replay unchanged.

use crate::errors::DbError;
use crate::index::IndexSpec;
use crate::types::CollectionName;
use crate::utils::fsutil::open_append_secure;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use bson::Document as BsonDocument;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalOp {
    CreateCollection { collection: CollectionName },
    Insert { collection: CollectionName, id: String, body: Vec<u8> },
    Update { collection: CollectionName, id: String, body: Vec<u8> },
    Delete { collection: CollectionName, id: String },
    CreateIndex { collection: CollectionName, spec: IndexSpec },
    DropIndex { collection: CollectionName, name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalRecord {
    pub seq: u64,
    pub ts_ms: i64,
    pub op: WalOp,
}

pub struct Wal {
    path: PathBuf,
    file: File,
    next_seq: u64,
}

impl Wal {
    /// Open (or create) the log at `path`, positioned for append. A truncated trailing record
    /// is cut off so new appends start on a record boundary.
    ///
    /// # Errors
    /// Returns an error when the file cannot be opened or an existing record fails to decode.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let file = open_append_secure(path)?;
        let buf = read_file(path)?;
        let (records, valid_len) = scan_records(&buf, path)?;
        if valid_len < buf.len() {
            file.set_len(crate::utils::num::usize_to_u64(valid_len))?;
        }
        let next_seq = records.last().map_or(1, |r| r.seq + 1);
        Ok(Self { path: path.to_path_buf(), file, next_seq })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one operation and flush it to disk. Returns the record's sequence number.
    ///
    /// # Errors
    /// Returns an error when encoding or the write fails.
    pub fn append(&mut self, op: WalOp) -> Result<u64, DbError> {
        let rec = WalRecord { seq: self.next_seq, ts_ms: chrono::Utc::now().timestamp_millis(), op };
        let data = encode_to_vec(&rec, standard())?;
        let len = crate::utils::num::usize_to_u64(data.len());
        self.file.write_all(&len.to_le_bytes())?;
        self.file.write_all(&data)?;
        self.file.sync_data()?;
        self.next_seq += 1;
        Ok(rec.seq)
    }

    /// # Errors
    /// See [`read_records`].
    pub fn read_all(&self) -> Result<Vec<WalRecord>, DbError> {
        read_records(&self.path)
    }
}

/// Read every complete record in `path`. A missing file reads as empty; a truncated trailing
/// record (an interrupted append) is ignored.
///
/// # Errors
/// Returns an error on I/O failure or when a complete record cannot be decoded.
pub fn read_records(path: &Path) -> Result<Vec<WalRecord>, DbError> {
    let buf = read_file(path)?;
    Ok(scan_records(&buf, path)?.0)
}

fn read_file(path: &Path) -> Result<Vec<u8>, DbError> {
    let mut buf = Vec::new();
    match File::open(path) {
        Ok(mut f) => {
            f.read_to_end(&mut buf)?;
            Ok(buf)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(buf),
        Err(e) => Err(e.into()),
    }
}

/// Decoded records plus the byte length they cover.
fn scan_records(buf: &[u8], path: &Path) -> Result<(Vec<WalRecord>, usize), DbError> {
    let mut records = Vec::new();
    let mut offset = 0usize;
    while offset + 8 <= buf.len() {
        let Ok(len_bytes) = <[u8; 8]>::try_from(&buf[offset..offset + 8]) else { break };
        let Ok(len) = usize::try_from(u64::from_le_bytes(len_bytes)) else { break };
        if len > buf.len() - offset - 8 {
            break;
        }
        let (rec, _) = decode_from_slice::<WalRecord, _>(&buf[offset + 8..offset + 8 + len], standard())
            .map_err(|e| DbError::WalError(format!("{}: bad record at offset {offset}: {e}", path.display())))?;
        records.push(rec);
        offset += 8 + len;
    }
    if offset < buf.len() {
        log::warn!("wal {}: ignoring truncated record at offset {offset}", path.display());
    }
    Ok((records, offset))
}

/// # Errors
/// Returns `WalError` if the document cannot be serialized.
pub fn encode_body(doc: &BsonDocument) -> Result<Vec<u8>, DbError> {
    doc.to_vec().map_err(|e| DbError::WalError(format!("encode body: {e}")))
}

/// # Errors
/// Returns `WalError` for bytes that are not a BSON document.
pub fn decode_body(bytes: &[u8]) -> Result<BsonDocument, DbError> {
    BsonDocument::from_reader(bytes).map_err(|e| DbError::WalError(format!("decode body: {e}")))
}
