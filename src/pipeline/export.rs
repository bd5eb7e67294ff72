//! Export a read query as CSV, optionally bundled with the blobs its `data`
//! column references.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::pipeline::import::BlobStore;
use crate::views::{run_query, QueryResult};

/// Column holding blob names.
pub const DATA_COLUMN: &str = "data";
/// Name of the CSV inside an archive.
pub const ARCHIVE_CSV_NAME: &str = "export.csv";
/// Directory of bundled blobs inside an archive.
pub const ARCHIVE_DATA_DIR: &str = "data";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Only read-only queries can be exported")]
    NotReadOnly,

    #[error("Query result has no '{DATA_COLUMN}' column to bundle blobs from")]
    MissingDataColumn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
    /// Blobs bundled; zero for a plain CSV export.
    pub blobs: usize,
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_csv(result: &QueryResult) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&result.columns)?;
    for row in &result.rows {
        writer.write_record(row.iter().map(cell_text))?;
    }
    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// Distinct non-null blob names in the `data` column.
fn referenced_blobs(result: &QueryResult) -> Result<BTreeSet<String>, ExportError> {
    let col = result
        .column_index(DATA_COLUMN)
        .ok_or(ExportError::MissingDataColumn)?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| match &row[col] {
            Value::String(name) if !name.is_empty() => Some(name.clone()),
            _ => None,
        })
        .collect())
}

fn append_bytes<W: Write>(tar: &mut tar::Builder<W>, path: &str, bytes: &[u8]) -> std::io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(chrono::Utc::now().timestamp().max(0) as u64);
    tar.append_data(&mut header, path, bytes)
}

fn build_archive(csv_bytes: &[u8], store: &dyn BlobStore, blobs: &BTreeSet<String>) -> Result<Vec<u8>, ExportError> {
    let mut tar_bytes = Vec::new();
    {
        let gz = flate2::write::GzEncoder::new(&mut tar_bytes, flate2::Compression::default());
        let mut tar = tar::Builder::new(gz);

        append_bytes(&mut tar, ARCHIVE_CSV_NAME, csv_bytes)?;
        for name in blobs {
            let bytes = store.read(name)?;
            append_bytes(&mut tar, &format!("{ARCHIVE_DATA_DIR}/{name}"), &bytes)?;
        }

        tar.into_inner()?.finish()?;
    }
    Ok(tar_bytes)
}

/// Replace `path` only once the new content is fully written.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Run `sql` and write its rows to `out` as CSV, or as a `.tar.gz` holding
/// the CSV and every referenced blob when `include_data` is set.
pub fn export_query(
    conn: &Connection,
    store: &dyn BlobStore,
    sql: &str,
    out: &Path,
    include_data: bool,
) -> Result<ExportSummary, ExportError> {
    if !conn.prepare(sql).map_err(DatabaseError::from)?.readonly() {
        return Err(ExportError::NotReadOnly);
    }
    let result = run_query(conn, sql)?;
    let csv_bytes = to_csv(&result)?;

    let blobs = if include_data {
        let blobs = referenced_blobs(&result)?;
        write_atomic(out, &build_archive(&csv_bytes, store, &blobs)?)?;
        blobs.len()
    } else {
        write_atomic(out, &csv_bytes)?;
        0
    };

    tracing::info!(
        path = %out.display(),
        rows = result.len(),
        blobs,
        include_data,
        "Export written"
    );
    Ok(ExportSummary {
        path: out.to_path_buf(),
        rows: result.len(),
        columns: result.columns.len(),
        blobs,
    })
}
