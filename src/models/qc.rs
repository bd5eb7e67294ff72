use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ValueType;

/// A named automated check. `implementation` is the key of a registered filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcAnnotator {
    pub id: Uuid,
    pub name: String,
    pub implementation: String,
    pub value_type: ValueType,
    pub description: Option<String>,
    /// Default annotators run on every new measurement.
    pub is_default: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl QcAnnotator {
    pub fn new(name: &str, implementation: &str, value_type: ValueType) -> Self {
        let now = super::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            implementation: implementation.to_string(),
            value_type,
            description: None,
            is_default: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcAnnotation {
    pub id: Uuid,
    pub annotator_id: Uuid,
    pub array_data_id: Uuid,
    /// Null when the filter failed.
    pub value: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl QcAnnotation {
    pub fn new(annotator_id: Uuid, array_data_id: Uuid) -> Self {
        let now = super::now();
        Self {
            id: Uuid::new_v4(),
            annotator_id,
            array_data_id,
            value: None,
            created_at: now,
            updated_at: now,
        }
    }
}
