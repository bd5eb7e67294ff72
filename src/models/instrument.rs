use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bulk-upload column holding the instrument's database id.
pub const INSTRUMENT_COLUMN: &str = "instrument";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: Uuid,
    pub cid: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub center_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Instrument {
    pub fn new(cid: &str, manufacturer: &str, model: &str, serial_number: &str) -> Self {
        let now = super::now();
        Self {
            id: Uuid::new_v4(),
            cid: cid.to_string(),
            manufacturer: manufacturer.to_string(),
            model: model.to_string(),
            serial_number: serial_number.to_string(),
            center_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}
