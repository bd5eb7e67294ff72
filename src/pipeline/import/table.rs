//! In-memory tables produced by the reader and consumed by ingestion.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::ImportError;
use crate::models::CellValue;

/// One meta-data row keyed by its parsed index value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableRow {
    pub index: Uuid,
    pub cells: HashMap<String, CellValue>,
}

/// A normalized meta-data table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub index_column: String,
    /// Non-index columns in file order.
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
    /// Rows discarded because their index cell was null.
    pub dropped_rows: usize,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn indices(&self) -> Vec<Uuid> {
        self.rows.iter().map(|r| r.index).collect()
    }
}

/// One measurement row: independent axis values from the header, dependent
/// values from the row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeasurementRow {
    pub index: Uuid,
    pub wavelength: Vec<f64>,
    pub intensity: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeasurementTable {
    pub index_column: String,
    pub rows: Vec<MeasurementRow>,
    pub dropped_rows: usize,
}

impl MeasurementTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn indices(&self) -> Vec<Uuid> {
        self.rows.iter().map(|r| r.index).collect()
    }
}

/// A meta-data row joined with its measurement arrays.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JoinedRow {
    pub index: Uuid,
    pub cells: HashMap<String, CellValue>,
    pub wavelength: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl JoinedRow {
    /// Cell under `column`; absent columns read as null.
    pub fn get(&self, column: &str) -> &CellValue {
        self.cells.get(column).unwrap_or(&CellValue::Null)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).as_text()
    }

    pub fn int(&self, column: &str) -> Result<Option<i64>, ImportError> {
        let cell = self.get(column);
        if cell.is_null() {
            return Ok(None);
        }
        cell.as_i64()
            .map(Some)
            .ok_or_else(|| cast_error(column, cell, "INT"))
    }

    pub fn float(&self, column: &str) -> Result<Option<f64>, ImportError> {
        let cell = self.get(column);
        if cell.is_null() {
            return Ok(None);
        }
        match cell.as_f64() {
            Some(f) if f.is_finite() => Ok(Some(f)),
            _ => Err(cast_error(column, cell, "FLOAT")),
        }
    }

    /// Date-time cells accept `YYYY-MM-DD[ T]HH:MM:SS[.f]` or a bare date.
    pub fn datetime(&self, column: &str) -> Result<Option<NaiveDateTime>, ImportError> {
        let Some(text) = self.text(column) else {
            return Ok(None);
        };
        let text = text.trim();
        for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
                return Ok(Some(dt));
            }
        }
        chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Some)
            .ok_or_else(|| cast_error(column, self.get(column), "DATETIME"))
    }
}

fn cast_error(column: &str, cell: &CellValue, expected: &str) -> ImportError {
    ImportError::TypeCast {
        name: column.to_string(),
        value: cell.to_string(),
        expected: expected.to_string(),
    }
}
