use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ObservableCategory, ValueType};
use super::ValidationError;

/// A typed attribute definition. `center_id = None` makes it global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observable {
    pub id: Uuid,
    pub category: ObservableCategory,
    pub name: String,
    pub description: String,
    /// Column name used in bulk uploads (matched lower-cased).
    pub alias: String,
    pub value_class: ValueType,
    /// Comma-separated allowed values; STR observables only.
    pub value_choices: Option<String>,
    pub center_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Observable {
    pub fn new(category: ObservableCategory, name: &str, value_class: ValueType) -> Self {
        let now = super::now();
        Self {
            id: Uuid::new_v4(),
            category,
            name: name.to_string(),
            description: String::new(),
            alias: String::new(),
            value_class,
            value_choices: None,
            center_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fill in defaults then check the definition.
    pub fn clean(&mut self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError("Observable name cannot be blank".into()));
        }
        if self.alias.trim().is_empty() {
            self.alias = self.name.replace('_', " ");
        }
        if self.value_choices.as_deref().is_some_and(|c| !c.trim().is_empty())
            && self.value_class != ValueType::Str
        {
            return Err(ValidationError(format!(
                "Observable choices are only permitted of STR value_class, not '{}'",
                self.value_class
            )));
        }
        Ok(())
    }

    /// Allowed values, trimmed and upper-cased.
    pub fn list_choices(&self) -> Option<Vec<String>> {
        let choices = self.value_choices.as_deref()?.trim();
        if choices.is_empty() {
            return None;
        }
        Some(choices.split(',').map(|c| c.trim().to_uppercase()).collect())
    }

    /// Lower-cased alias, the key looked up in uploaded rows.
    pub fn column_name(&self) -> String {
        self.alias.to_lowercase()
    }

    pub fn is_visible_to(&self, center_id: &Uuid) -> bool {
        self.center_id.map_or(true, |c| c == *center_id)
    }
}

/// A visit's value for one observable, stored in text form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub observable_id: Uuid,
    pub days_observed: Option<i64>,
    pub observable_value: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Observation {
    pub fn new(visit_id: Uuid, observable_id: Uuid, observable_value: Option<String>) -> Self {
        let now = super::now();
        Self {
            id: Uuid::new_v4(),
            visit_id,
            observable_id,
            days_observed: None,
            observable_value,
            created_at: now,
            updated_at: now,
        }
    }
}
