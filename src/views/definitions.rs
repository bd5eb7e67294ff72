//! The statically declared view set and its defining SQL.

use std::str::FromStr;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::sql::secure_name;
use super::ViewError;
use crate::db::repository;
use crate::models::{Observable, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewKind {
    /// One row per observation, joined with its observable.
    Observations,
    /// One row per visit, one column per observable.
    VisitObservations,
    /// Subject, visit, sample, measurement and instrument fields plus the
    /// visit's pivoted observations.
    FullPatient,
}

impl ViewKind {
    pub const ALL: [ViewKind; 3] = [Self::Observations, Self::VisitObservations, Self::FullPatient];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Observations => "v_observations",
            Self::VisitObservations => "v_visit_observations",
            Self::FullPatient => "full_patient",
        }
    }

    /// Views read by this one's defining query.
    pub fn dependencies(&self) -> &'static [ViewKind] {
        match self {
            Self::Observations => &[],
            Self::VisitObservations => &[Self::Observations],
            Self::FullPatient => &[Self::VisitObservations],
        }
    }

    /// `CREATE VIEW` statement for the current database contents.
    /// `exclusions` lists observable names left out of the pivot.
    pub fn create_sql(&self, conn: &Connection, exclusions: &[String]) -> Result<String, ViewError> {
        let sql = match self {
            Self::Observations => observations_sql(),
            Self::VisitObservations => {
                let observables = repository::list_observables(conn)?;
                visit_observations_sql(&observables, exclusions)?
            }
            Self::FullPatient => full_patient_sql(),
        };
        Ok(sql)
    }
}

impl std::fmt::Display for ViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ViewKind {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| ViewError::UnknownView(s.to_string()))
    }
}

fn observations_sql() -> String {
    "CREATE VIEW v_observations AS
     SELECT s.visit_id,
            s.id AS observation_id,
            d.id AS observable_id,
            d.name AS observable,
            d.category AS observable_category,
            d.value_class,
            s.days_observed,
            s.observable_value
       FROM observation s
       JOIN observable d ON d.id = s.observable_id"
        .to_string()
}

fn pivot_value(value_class: ValueType) -> &'static str {
    match value_class {
        ValueType::Float => "CAST(observable_value AS REAL)",
        ValueType::Int => "CAST(observable_value AS INTEGER)",
        ValueType::Bool | ValueType::Str => "observable_value",
    }
}

/// Observable names are interpolated as both literals and column names, so
/// each must pass `secure_name`.
fn visit_observations_sql(observables: &[Observable], exclusions: &[String]) -> Result<String, ViewError> {
    let mut columns = Vec::new();
    for observable in observables {
        let name = &observable.name;
        if exclusions.iter().any(|e| e.eq_ignore_ascii_case(name)) {
            continue;
        }
        secure_name(name)?;
        columns.push(format!(
            "MAX(CASE WHEN observable = '{name}' THEN {} ELSE NULL END) AS \"{name}\"",
            pivot_value(observable.value_class)
        ));
    }

    let mut sql = String::from("CREATE VIEW v_visit_observations AS\n     SELECT visit_id");
    for column in &columns {
        sql.push_str(",\n            ");
        sql.push_str(column);
    }
    sql.push_str("\n       FROM v_observations\n      GROUP BY visit_id");
    Ok(sql)
}

/// `alias.col AS label_col` for each column.
fn prefixed(alias: &str, label: &str, cols: &[&str]) -> String {
    cols.iter()
        .map(|c| format!("{alias}.{c} AS {label}_{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `data` and `patient_id` keep their bare names; exporters rely on them.
fn full_patient_sql() -> String {
    let fields = [
        prefixed("bst", "biosampletype", &["name"]),
        prefixed(
            "bs",
            "biosample",
            &[
                "sample_study_id",
                "sample_processing",
                "sample_extraction",
                "sample_extraction_tube",
                "centrifuge_time",
                "centrifuge_rpm",
                "freezing_temp",
                "thawing_temp",
                "thawing_time",
                "freezing_time",
            ],
        ),
        prefixed("i", "instrument", &["manufacturer", "model", "serial_number"]),
        prefixed("smt", "arraymeasurementtype", &["name"]),
        prefixed(
            "sd",
            "arraydata",
            &["acquisition_time", "resolution", "power", "temperature", "pressure", "humidity", "n_points"],
        ),
    ]
    .join(",\n            ");

    format!(
        "CREATE VIEW full_patient AS
     SELECT p.patient_id,
            {fields},
            sd.data,
            vs.*
       FROM patient p
       JOIN visit v ON p.patient_id = v.patient_id
       JOIN bio_sample bs ON bs.visit_id = v.id
       JOIN bio_sample_type bst ON bst.id = bs.sample_type_id
       JOIN array_data sd ON sd.bio_sample_id = bs.id
       JOIN array_measurement_type smt ON smt.id = sd.measurement_type_id
       JOIN instrument i ON i.id = sd.instrument_id
       LEFT OUTER JOIN v_visit_observations vs ON vs.visit_id = v.id"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObservableCategory;

    #[test]
    fn names_round_trip_through_from_str() {
        for kind in ViewKind::ALL {
            assert_eq!(kind.name().parse::<ViewKind>().unwrap(), kind);
        }
        assert!(matches!("flat_view".parse::<ViewKind>(), Err(ViewError::UnknownView(_))));
    }

    #[test]
    fn pivot_casts_numeric_observables() {
        let temp = Observable::new(ObservableCategory::Vitals, "body_temperature", ValueType::Float);
        let rate = Observable::new(ObservableCategory::Vitals, "heart_rate", ValueType::Int);
        let fever = Observable::new(ObservableCategory::Symptom, "fever", ValueType::Bool);
        let sql = visit_observations_sql(&[temp, rate, fever], &[]).unwrap();
        assert!(sql.contains("CAST(observable_value AS REAL) ELSE NULL END) AS \"body_temperature\""));
        assert!(sql.contains("CAST(observable_value AS INTEGER) ELSE NULL END) AS \"heart_rate\""));
        assert!(sql.contains("THEN observable_value ELSE NULL END) AS \"fever\""));
    }

    #[test]
    fn pivot_skips_excluded_observables() {
        let fever = Observable::new(ObservableCategory::Symptom, "fever", ValueType::Bool);
        let notes = Observable::new(ObservableCategory::PatientInfo, "notes", ValueType::Str);
        let sql = visit_observations_sql(&[fever, notes], &["NOTES".to_string()]).unwrap();
        assert!(sql.contains("AS \"fever\""));
        assert!(!sql.contains("notes"));
    }

    #[test]
    fn pivot_without_observables_groups_visits_only() {
        let sql = visit_observations_sql(&[], &[]).unwrap();
        assert!(sql.contains("SELECT visit_id\n"));
        assert!(sql.contains("GROUP BY visit_id"));
    }

    #[test]
    fn pivot_rejects_injected_names() {
        let bad = Observable::new(ObservableCategory::Symptom, "x' THEN 1 END) AS y --", ValueType::Str);
        assert!(matches!(
            visit_observations_sql(&[bad], &[]),
            Err(ViewError::InsecureName(_))
        ));
    }

    #[test]
    fn full_patient_keeps_data_column_bare() {
        let sql = full_patient_sql();
        assert!(sql.contains("sd.data,"));
        assert!(sql.contains("bst.name AS biosampletype_name"));
        assert!(sql.contains("LEFT OUTER JOIN v_visit_observations"));
    }
}
