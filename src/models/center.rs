use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant owning subjects, instruments and centre-scoped observables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Center {
    pub id: Uuid,
    pub name: String,
    pub country: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Center {
    pub fn new(name: &str, country: &str) -> Self {
        let now = super::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            country: country.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
