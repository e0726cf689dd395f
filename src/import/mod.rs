mod detect;
mod ndjson;
mod options;
mod pipeline;
mod record;

pub use detect::{detect_content, detect_format};
pub use options::{ImportFormat, ImportOptions, ImportReport};
pub use pipeline::{import_books, import_file};
