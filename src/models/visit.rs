use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;

pub const DAYS_OBSERVED_COLUMN: &str = "days observed";

/// One clinical encounter. `previous_visit_id` is a plain back-reference; the
/// chain is acyclic by convention only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub previous_visit_id: Option<Uuid>,
    pub days_observed: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Visit {
    pub fn new(patient_id: Uuid, days_observed: Option<i64>) -> Self {
        let now = super::now();
        Self {
            id: Uuid::new_v4(),
            patient_id,
            previous_visit_id: None,
            days_observed,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self, previous: Option<&Visit>) -> Result<(), ValidationError> {
        if let Some(days) = self.days_observed.filter(|d| *d < 0) {
            return Err(ValidationError(format!("days observed must be >= 0, not {days}")));
        }
        if self.previous_visit_id == Some(self.id) {
            return Err(ValidationError(
                "Previous visit cannot be this current visit".into(),
            ));
        }
        if let Some(prev) = previous {
            if prev.patient_id != self.patient_id {
                return Err(ValidationError(
                    "Previous visit does not belong to this patient".into(),
                ));
            }
        }
        Ok(())
    }
}
