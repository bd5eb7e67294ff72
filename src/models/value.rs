//! Typed table cells and observation values.
//!
//! `CellValue` is what the tabular reader produces; `ObservationValue` is the
//! result of casting a cell to an observable's declared `ValueType`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::enums::ValueType;

/// One normalized cell of an uploaded table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text form of a non-null cell.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A cell cast to an observable's declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ObservationValue {
    /// Form persisted in `observation.observable_value`.
    pub fn to_db_string(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Str(s) => s.clone(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("'{value}' cannot be cast to {expected}")]
pub struct CastError {
    pub value: String,
    pub expected: ValueType,
}

impl ValueType {
    /// Cast a cell to this type. Null cells are never cast; callers skip them.
    pub fn cast(&self, value: &CellValue) -> Result<ObservationValue, CastError> {
        let fail = || CastError {
            value: value.to_string(),
            expected: *self,
        };

        match self {
            ValueType::Bool => to_bool(value).map(ObservationValue::Bool).ok_or_else(fail),
            ValueType::Int => match value {
                CellValue::Bool(b) => Ok(ObservationValue::Int(i64::from(*b))),
                CellValue::Int(i) => Ok(ObservationValue::Int(*i)),
                CellValue::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                    Ok(ObservationValue::Int(*f as i64))
                }
                CellValue::Text(s) => s.trim().parse().map(ObservationValue::Int).map_err(|_| fail()),
                _ => Err(fail()),
            },
            ValueType::Float => {
                let parsed = match value {
                    CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                    other => other.as_f64(),
                };
                match parsed {
                    Some(f) if f.is_finite() => Ok(ObservationValue::Float(f)),
                    _ => Err(fail()),
                }
            }
            ValueType::Str => match value {
                CellValue::Null => Err(fail()),
                other => Ok(ObservationValue::Str(other.to_string())),
            },
        }
    }
}

/// Boolean aliases: true/yes, false/no (any case), native bools, and 0/1.
pub fn to_bool(value: &CellValue) -> Option<bool> {
    match value {
        CellValue::Bool(b) => Some(*b),
        CellValue::Int(0) => Some(false),
        CellValue::Int(1) => Some(true),
        CellValue::Float(f) if *f == 0.0 => Some(false),
        CellValue::Float(f) if *f == 1.0 => Some(true),
        CellValue::Text(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
