//! Repository layer: entity-scoped database operations.
//!
//! Free functions over `&Connection` so they compose inside whatever
//! transaction or savepoint the caller has open.

mod array_data;
mod center;
mod instrument;
mod observable;
mod patient;
mod qc;
mod sample;
mod visit;

pub use array_data::*;
pub use center::*;
pub use instrument::*;
pub use observable::*;
pub use patient::*;
pub use qc::*;
pub use sample::*;
pub use visit::*;

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

use super::DatabaseError;

/// Read a TEXT uuid column.
pub(crate) fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(text) => Uuid::parse_str(&text)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// Read a TEXT column holding one of the `str_enum!` values.
pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = DatabaseError>,
{
    let text: String = row.get(idx)?;
    T::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Turn `QueryReturnedNoRows` into `None`.
pub(crate) fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>, DatabaseError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
