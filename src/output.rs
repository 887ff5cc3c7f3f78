//! Persisted outputs: one CSV per scrape domain and raw HTML snapshots of fetched pages.
//!
//! CSV headers come from the record field names. `None` is written as an empty field and read
//! back as `None`. Zero records produce an empty file with no header.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> OutputError + '_ {
    move |source| OutputError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn ensure_parent(path: &Path) -> Result<(), OutputError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(io_error(parent))
        }
        _ => Ok(()),
    }
}

/// Write `records` to `path`, replacing any previous file.
pub fn write_csv<R: Serialize>(path: &Path, records: &[R]) -> Result<(), OutputError> {
    ensure_parent(path)?;
    if records.is_empty() {
        File::create(path).map_err(io_error(path))?;
        return Ok(());
    }
    let mut writer = csv::Writer::from_path(path).map_err(csv_error(path))?;
    for record in records {
        writer.serialize(record).map_err(csv_error(path))?;
    }
    writer.flush().map_err(io_error(path))
}

/// Read records back from a CSV written by [write_csv]. An empty file has no records.
pub fn read_records<R: DeserializeOwned>(path: &Path) -> Result<Vec<R>, OutputError> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_error(path))?;
    reader
        .deserialize()
        .collect::<Result<Vec<R>, csv::Error>>()
        .map_err(csv_error(path))
}

/// Save each `(key, html)` as `<dir>/<key>.html`. Returns how many files were written.
pub fn write_snapshots(dir: &Path, pages: &[(String, String)]) -> Result<usize, OutputError> {
    std::fs::create_dir_all(dir).map_err(io_error(dir))?;
    for (key, html) in pages {
        let path = dir.join(format!("{}.html", key));
        std::fs::write(&path, html).map_err(io_error(&path))?;
    }
    Ok(pages.len())
}
