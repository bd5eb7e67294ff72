//! Orphaned blob detection: blobs in the store that no measurement references.

use std::collections::HashSet;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::repository;
use crate::pipeline::import::{BlobStore, ImportError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PruneReport {
    pub orphans: Vec<String>,
    /// Orphans actually removed; empty for a dry run.
    pub deleted: Vec<String>,
    pub dry_run: bool,
}

/// Sorted names of stored blobs with no `array_data.data` reference.
pub fn find_orphan_blobs(conn: &Connection, store: &dyn BlobStore) -> Result<Vec<String>, ImportError> {
    let referenced: HashSet<String> = repository::list_blob_names(conn)?.into_iter().collect();
    let mut orphans: Vec<String> = store
        .list()?
        .into_iter()
        .filter(|name| !referenced.contains(name))
        .collect();
    orphans.sort();
    Ok(orphans)
}

/// Delete orphaned blobs, or only report them when `dry_run` is set.
/// A failed delete is logged and the blob left out of `deleted`.
pub fn prune_orphan_blobs(
    conn: &Connection,
    store: &dyn BlobStore,
    dry_run: bool,
) -> Result<PruneReport, ImportError> {
    let orphans = find_orphan_blobs(conn, store)?;
    let mut deleted = Vec::new();

    if !dry_run {
        for name in &orphans {
            match store.delete(name) {
                Ok(()) => deleted.push(name.clone()),
                Err(e) => tracing::warn!(blob = %name, error = %e, "Failed to delete orphaned blob"),
            }
        }
    }

    tracing::info!(orphans = orphans.len(), deleted = deleted.len(), dry_run, "Blob prune complete");
    Ok(PruneReport {
        orphans,
        deleted,
        dry_run,
    })
}
