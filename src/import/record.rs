use crate::book::Book;
use crate::collection::Collection;
use crate::document::Document;
use crate::errors::DbError;
use crate::utils::json::json_value_to_bson_document;
use bson::Document as BsonDocument;
use serde_json::Value;
use std::fs::File;
use std::io::Write;

use super::options::{ImportOptions, ImportReport};

/// Validates parsed records as books and inserts them, tallying the outcome.
pub(super) struct RecordSink<'a> {
    collection: &'a Collection,
    opts: &'a ImportOptions,
    sidecar: Option<File>,
    pub report: ImportReport,
}

fn book_document(v: &Value) -> Result<BsonDocument, DbError> {
    let raw = json_value_to_bson_document(v)?;
    Ok(Book::try_from(&raw)?.to_document())
}

impl<'a> RecordSink<'a> {
    pub(super) fn new(collection: &'a Collection, opts: &'a ImportOptions) -> Result<Self, DbError> {
        let sidecar = match &opts.error_sidecar {
            Some(p) if opts.skip_errors => Some(File::create(p)?),
            _ => None,
        };
        Ok(Self { collection, opts, sidecar, report: ImportReport::default() })
    }

    /// Insert failures are store errors and always abort; record errors abort only when
    /// `skip_errors` is off.
    pub(super) fn accept(&mut self, record_no: usize, parsed: Result<Value, DbError>) -> Result<(), DbError> {
        match parsed.and_then(|v| book_document(&v)) {
            Ok(doc) => {
                self.collection.insert_document(Document::new(doc))?;
                self.report.inserted += 1;
                if let Some(n) = self.opts.progress_every
                    && n > 0
                    && record_no % n == 0
                {
                    log::info!("imported {} records into {}", self.report.inserted, self.collection.name_str());
                }
                Ok(())
            }
            Err(e) if self.opts.skip_errors => {
                log::warn!("import: skipping record {record_no}: {e}");
                if let Some(f) = self.sidecar.as_mut() {
                    let line = serde_json::json!({"record": record_no, "error": e.to_string()});
                    writeln!(f, "{line}")?;
                }
                self.report.skipped += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
