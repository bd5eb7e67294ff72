use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;

/// Bulk-upload column carrying the centre-local subject code.
pub const PATIENT_CID_COLUMN: &str = "patient_cid";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: Uuid,
    /// Identifier prescribed by the owning centre; unique per centre.
    pub patient_cid: Option<Uuid>,
    pub center_id: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Patient {
    pub fn new(patient_id: Uuid, patient_cid: Option<Uuid>, center_id: Uuid) -> Self {
        let now = super::now();
        Self {
            patient_id,
            patient_cid,
            center_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// `patient_cid` is only unique within a centre, so it may not shadow the global id.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.patient_cid == Some(self.patient_id) {
            return Err(ValidationError(
                "Patient ID and patient CID cannot be the same".into(),
            ));
        }
        Ok(())
    }
}
