//! Derived views over the entity tables.
//!
//! The view set is declared statically in `definitions`; `manager` rebuilds
//! them dependency-first inside one savepoint. Views never refresh on read:
//! after upstream data changes a view stays stale until `update_view` runs.

pub mod definitions;
pub mod hooks;
pub mod manager;
pub mod sql;

pub use definitions::*;
pub use hooks::*;
pub use manager::*;
pub use sql::*;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::ValidationError;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("Insecure SQL name '{0}': expected only [_a-zA-Z0-9]")]
    InsecureName(String),

    #[error("View '{view}' failed its integrity check: {reason}")]
    Integrity { view: String, reason: String },

    #[error("Relation does not exist: {0}")]
    RelationNotFound(String),

    #[error("Unknown view '{0}'")]
    UnknownView(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for ViewError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::RelationNotFound(name) => Self::RelationNotFound(name),
            other => Self::Database(other),
        }
    }
}

impl From<ValidationError> for ViewError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.0)
    }
}
