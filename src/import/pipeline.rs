use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::collection::Collection;
use crate::errors::DbError;

use super::detect::{detect_content, detect_format};
use super::ndjson::{import_json_array, import_ndjson};
use super::options::{ImportFormat, ImportOptions, ImportReport};
use super::record::RecordSink;

/// Import books from a file. `ImportFormat::Auto` is resolved from the extension, then the content.
///
/// # Errors
/// Returns I/O errors, malformed input, and the first bad record when `skip_errors` is off.
pub fn import_file<P: AsRef<Path>>(
    collection: &Collection,
    path: P,
    opts: &ImportOptions,
) -> Result<ImportReport, DbError> {
    log::info!("import: path={}, collection={}", path.as_ref().display(), collection.name_str());
    let mut reader = BufReader::new(File::open(&path)?);
    let format = match opts.format {
        ImportFormat::Auto => detect_format(&mut reader, path.as_ref())?,
        other => other,
    };
    run(collection, reader, format, opts)
}

/// Import books from a JSON array or NDJSON stream, validating each one as a `Book`.
///
/// # Errors
/// See [`import_file`].
pub fn import_books<R: Read>(
    collection: &Collection,
    reader: R,
    opts: &ImportOptions,
) -> Result<ImportReport, DbError> {
    let mut reader = BufReader::new(reader);
    let format = match opts.format {
        ImportFormat::Auto => detect_content(&mut reader)?,
        other => other,
    };
    run(collection, reader, format, opts)
}

fn run<R: Read>(
    collection: &Collection,
    reader: BufReader<R>,
    format: ImportFormat,
    opts: &ImportOptions,
) -> Result<ImportReport, DbError> {
    let mut sink = RecordSink::new(collection, opts)?;
    match format {
        ImportFormat::JsonArray => import_json_array(reader, &mut sink)?,
        ImportFormat::Ndjson | ImportFormat::Auto => import_ndjson(reader, &mut sink)?,
    }
    log::info!(
        "import into {} finished: inserted={}, skipped={}",
        collection.name_str(),
        sink.report.inserted,
        sink.report.skipped
    );
    Ok(sink.report)
}
