use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Normalize a database path: ensure a `.db` extension and make it absolute.
#[must_use]
pub fn normalize_db_path(name_or_path: Option<&str>) -> PathBuf {
    let raw = match name_or_path {
        Some(s) if !s.trim().is_empty() => PathBuf::from(s),
        _ => PathBuf::from(crate::DEFAULT_DB_NAME),
    };
    let pb = if raw.extension().is_none() {
        let mut p = raw;
        p.set_extension("db");
        p
    } else {
        raw
    };
    if pb.is_absolute() {
        pb
    } else {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(pb)
    }
}

/// WAL file that sits beside a database file: `{stem}.wal`.
#[must_use]
pub fn wal_path_for(db_path: &Path) -> PathBuf {
    db_path.with_extension("wal")
}

/// Open a file for append/read without truncation, with restrictive permissions where supported.
///
/// # Errors
/// Returns an error if the file cannot be opened.
pub fn open_append_secure(path: &Path) -> io::Result<File> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        OpenOptions::new().read(true).append(true).create(true).mode(0o600).open(path)
    }
    #[cfg(not(unix))]
    {
        OpenOptions::new().read(true).append(true).create(true).open(path)
    }
}
