pub mod codec;
pub mod format;
pub mod hash;
pub mod importer;
pub mod reader;
pub mod staging;
pub mod table;
pub mod validation;

pub use codec::*;
pub use format::*;
pub use hash::*;
pub use importer::*;
pub use reader::*;
pub use staging::*;
pub use table::*;
pub use validation::*;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::ValidationError;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Unrecognized file format: {0}")]
    Format(String),

    #[error("Malformed data: {0}")]
    Parse(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("meta and array data must be of equal length ({meta_rows}!={measurement_rows})")]
    Alignment {
        meta_rows: usize,
        measurement_rows: usize,
    },

    #[error("Patient index mismatch: {0}")]
    IndexMismatch(String),

    #[error("The value '{value}' can not be cast to the expected type of '{expected}' for '{name}'")]
    TypeCast {
        name: String,
        value: String,
        expected: String,
    },

    #[error("{entity} does not exist: {key}")]
    Reference { entity: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<ValidationError> for ImportError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.0)
    }
}
