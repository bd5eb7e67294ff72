//! Quality-control annotators.
//!
//! An annotator row names a filter implementation by key; the registry maps
//! keys to `QcFilter` objects. A failing filter never fails the caller: the
//! failure is logged and the annotation is stored with a null value.

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{repository, DatabaseError};
use crate::models::{ArrayData, CellValue, QcAnnotation, QcAnnotator};
use crate::pipeline::import::{verify_measurement, ArrayPayload, BlobStore, ImportError};

/// Registry key of the built-in sum filter.
pub const SUM_FILTER: &str = "qc.sum";

#[derive(Error, Debug)]
pub enum QcError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("QC filter '{0}' is not registered")]
    UnknownFilter(String),

    #[error("QC filter failed: {0}")]
    Filter(String),
}

/// One QC check over a measurement's arrays.
pub trait QcFilter: Send + Sync {
    fn run(&self, payload: &ArrayPayload) -> Result<CellValue, QcError>;
}

/// Sum of the dependent values.
pub struct SumFilter;

impl QcFilter for SumFilter {
    fn run(&self, payload: &ArrayPayload) -> Result<CellValue, QcError> {
        Ok(CellValue::Float(payload.intensity.iter().sum()))
    }
}

/// Name-keyed filter implementations.
#[derive(Default)]
pub struct QcRegistry {
    filters: HashMap<String, Box<dyn QcFilter>>,
}

impl QcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(SUM_FILTER, Box::new(SumFilter));
        registry
    }

    pub fn register(&mut self, key: &str, filter: Box<dyn QcFilter>) {
        self.filters.insert(key.to_string(), filter);
    }

    pub fn get(&self, key: &str) -> Option<&dyn QcFilter> {
        self.filters.get(key).map(|f| f.as_ref())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.filters.contains_key(key)
    }
}

/// Persist an annotator after checking its implementation resolves.
pub fn register_annotator(
    conn: &Connection,
    registry: &QcRegistry,
    annotator: &QcAnnotator,
) -> Result<(), QcError> {
    if !registry.contains(&annotator.implementation) {
        return Err(QcError::UnknownFilter(annotator.implementation.clone()));
    }
    repository::insert_qc_annotator(conn, annotator)?;
    Ok(())
}

/// Run one annotator; any failure yields `None`.
fn run_annotator(registry: &QcRegistry, annotator: &QcAnnotator, payload: &ArrayPayload) -> Option<String> {
    let Some(filter) = registry.get(&annotator.implementation) else {
        tracing::warn!(
            annotator = %annotator.name,
            implementation = %annotator.implementation,
            "QC filter not registered, storing null"
        );
        return None;
    };

    let value = match filter.run(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(annotator = %annotator.name, error = %e, "QC filter failed, storing null");
            return None;
        }
    };

    match annotator.value_type.cast(&value) {
        Ok(cast) => Some(cast.to_db_string()),
        Err(e) => {
            tracing::warn!(annotator = %annotator.name, error = %e, "QC value has the wrong type, storing null");
            None
        }
    }
}

/// Annotate one measurement with `annotator`, or with every default annotator
/// when `None`. Existing annotations are kept unless `force` is set.
pub fn annotate(
    conn: &Connection,
    registry: &QcRegistry,
    data: &ArrayData,
    payload: &ArrayPayload,
    annotator: Option<&QcAnnotator>,
    force: bool,
) -> Result<Vec<QcAnnotation>, QcError> {
    let annotators = match annotator {
        Some(a) => vec![a.clone()],
        None => repository::list_default_annotators(conn)?,
    };
    let existing: HashSet<_> = repository::get_annotations_for(conn, &data.id)?
        .into_iter()
        .map(|a| a.annotator_id)
        .collect();

    let mut written = Vec::new();
    for annotator in annotators {
        if !force && existing.contains(&annotator.id) {
            continue;
        }
        let mut annotation = QcAnnotation::new(annotator.id, data.id);
        annotation.value = run_annotator(registry, &annotator, payload);
        repository::upsert_qc_annotation(conn, &annotation)?;
        written.push(annotation);
    }
    Ok(written)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotateSummary {
    pub measurements: usize,
    pub annotations: usize,
    /// Measurements whose blob was missing or failed verification.
    pub unreadable: usize,
}

/// Run the default annotators over every stored measurement in one transaction.
pub fn annotate_all(
    conn: &Connection,
    store: &dyn BlobStore,
    registry: &QcRegistry,
    force: bool,
) -> Result<AnnotateSummary, QcError> {
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let mut summary = AnnotateSummary::default();

    for data in repository::list_array_data(&tx)? {
        summary.measurements += 1;
        let payload = match verify_measurement(store, &data) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(measurement = %data.id, blob = %data.data, error = %e, "Skipping unreadable measurement");
                summary.unreadable += 1;
                continue;
            }
        };
        summary.annotations += annotate(&tx, registry, &data, &payload, None, force)?.len();
    }

    tx.commit().map_err(DatabaseError::from)?;
    tracing::info!(
        measurements = summary.measurements,
        annotations = summary.annotations,
        unreadable = summary.unreadable,
        force,
        "QC annotation complete"
    );
    Ok(summary)
}
