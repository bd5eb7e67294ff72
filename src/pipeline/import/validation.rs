//! Domain validation: table alignment, the meta/measurement join, and
//! observation value casting.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::table::{JoinedRow, MeasurementTable, Table};
use super::ImportError;
use crate::models::{
    measurement_columns, sample_columns, CellValue, Observable, DAYS_OBSERVED_COLUMN,
    INSTRUMENT_COLUMN, PATIENT_CID_COLUMN,
};

/// Meta-data and measurement tables must have the same number of rows.
pub fn validate_lengths(meta: &Table, measurements: &MeasurementTable) -> Result<(), ImportError> {
    if meta.len() != measurements.len() {
        return Err(ImportError::Alignment {
            meta_rows: meta.len(),
            measurement_rows: measurements.len(),
        });
    }
    Ok(())
}

fn check_unique(indices: &[Uuid], which: &str) -> Result<(), ImportError> {
    let mut seen = HashSet::with_capacity(indices.len());
    if let Some(dup) = indices.iter().find(|id| !seen.insert(**id)) {
        return Err(ImportError::IndexMismatch(format!(
            "{which} identifiers must be unique, '{dup}' repeats"
        )));
    }
    Ok(())
}

/// One-to-one join on the index. Both tables must carry the same unique
/// identifiers in the same order; the result keeps meta-data order.
pub fn join_with_validation(
    meta: Table,
    measurements: MeasurementTable,
) -> Result<Vec<JoinedRow>, ImportError> {
    validate_lengths(&meta, &measurements)?;

    let meta_indices = meta.indices();
    let measurement_indices = measurements.indices();
    if meta_indices != measurement_indices {
        return Err(ImportError::IndexMismatch(
            "indexes from the meta data file must exactly match all those from the array data file"
                .into(),
        ));
    }
    check_unique(&meta_indices, "meta data")?;

    let mut by_index: HashMap<Uuid, _> = measurements
        .rows
        .into_iter()
        .map(|row| (row.index, row))
        .collect();

    meta.rows
        .into_iter()
        .map(|row| {
            let measurement = by_index.remove(&row.index).ok_or_else(|| {
                ImportError::IndexMismatch(format!("no array data for '{}'", row.index))
            })?;
            Ok(JoinedRow {
                index: row.index,
                cells: row.cells,
                wavelength: measurement.wavelength,
                intensity: measurement.intensity,
            })
        })
        .collect()
}

/// Cast a raw cell to the observable's declared type and check its choices.
/// Returns the stored text form.
pub fn cast_observation(observable: &Observable, value: &CellValue) -> Result<String, ImportError> {
    let cast = observable
        .value_class
        .cast(value)
        .map_err(|e| ImportError::TypeCast {
            name: observable.name.clone(),
            value: e.value,
            expected: e.expected.to_string(),
        })?;
    let stored = cast.to_db_string();

    if let Some(choices) = observable.list_choices() {
        let normalized = stored.trim().to_uppercase();
        if !choices.contains(&normalized) {
            return Err(ImportError::TypeCast {
                name: observable.name.clone(),
                value: value.to_string(),
                expected: format!("one of {}", choices.join(", ")),
            });
        }
    }
    Ok(stored)
}

/// Observations may only reference global observables or those of the subject's centre.
pub fn check_observable_visible(observable: &Observable, center_id: &Uuid) -> Result<(), ImportError> {
    if !observable.is_visible_to(center_id) {
        return Err(ImportError::Validation(format!(
            "observable '{}' does not belong to the patient's center",
            observable.name
        )));
    }
    Ok(())
}

/// Column names accepted in bulk-upload meta-data files: identity and entity
/// fields, then one column per observable alias.
pub fn upload_column_names(index_column: &str, observables: &[Observable]) -> Vec<String> {
    let mut names = vec![index_column.to_string()];
    if index_column != PATIENT_CID_COLUMN {
        names.push(PATIENT_CID_COLUMN.to_string());
    }
    names.push(DAYS_OBSERVED_COLUMN.to_string());
    names.extend(sample_columns::ALL.iter().map(|c| c.to_string()));
    names.push(INSTRUMENT_COLUMN.to_string());
    names.extend(measurement_columns::ALL.iter().map(|c| c.to_string()));
    names.extend(observables.iter().map(Observable::column_name));
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ObservableCategory, ValueType};
    use crate::pipeline::import::table::{MeasurementRow, TableRow};

    fn meta(ids: &[u128]) -> Table {
        Table {
            index_column: "patient_id".into(),
            rows: ids
                .iter()
                .map(|i| TableRow {
                    index: Uuid::from_u128(*i),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn measurements(ids: &[u128]) -> MeasurementTable {
        MeasurementTable {
            index_column: "patient_id".into(),
            rows: ids
                .iter()
                .map(|i| MeasurementRow {
                    index: Uuid::from_u128(*i),
                    wavelength: vec![1.0],
                    intensity: vec![*i as f64],
                })
                .collect(),
            dropped_rows: 0,
        }
    }

    #[test]
    fn length_mismatch_names_both_lengths() {
        let ids: Vec<u128> = (1..=10).collect();
        let err = validate_lengths(&meta(&ids[..9]), &measurements(&ids)).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Alignment { meta_rows: 9, measurement_rows: 10 }
        ));
        assert!(err.to_string().contains("(9!=10)"));
    }

    #[test]
    fn join_pairs_rows_by_index() {
        let joined = join_with_validation(meta(&[1, 2, 3]), measurements(&[1, 2, 3])).unwrap();
        assert_eq!(joined.len(), 3);
        assert_eq!(joined[2].index, Uuid::from_u128(3));
        assert_eq!(joined[2].intensity, vec![3.0]);
    }

    #[test]
    fn join_rejects_different_indices() {
        let err = join_with_validation(meta(&[1, 2]), measurements(&[1, 3])).unwrap_err();
        assert!(matches!(err, ImportError::IndexMismatch(_)));
    }

    #[test]
    fn join_rejects_duplicate_indices() {
        let err = join_with_validation(meta(&[1, 1]), measurements(&[1, 1])).unwrap_err();
        assert!(matches!(err, ImportError::IndexMismatch(_)));
    }

    #[test]
    fn cast_failure_names_observable_and_value() {
        let obs = Observable::new(ObservableCategory::Vitals, "heart_rate", ValueType::Int);
        match cast_observation(&obs, &CellValue::Text("fast".into())).unwrap_err() {
            ImportError::TypeCast { name, value, expected } => {
                assert_eq!(name, "heart_rate");
                assert_eq!(value, "fast");
                assert_eq!(expected, "INT");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn choices_enforced() {
        let mut obs = Observable::new(ObservableCategory::Symptom, "severity", ValueType::Str);
        obs.value_choices = Some("mild, severe".into());
        assert_eq!(cast_observation(&obs, &CellValue::Text("Mild".into())).unwrap(), "Mild");
        assert!(matches!(
            cast_observation(&obs, &CellValue::Text("extreme".into())),
            Err(ImportError::TypeCast { .. })
        ));
    }

    #[test]
    fn column_listing_includes_observable_aliases() {
        let mut obs = Observable::new(ObservableCategory::Symptom, "loss_of_smell", ValueType::Bool);
        obs.clean().unwrap();
        let names = upload_column_names("patient_id", &[obs]);
        assert_eq!(names[0], "patient_id");
        assert!(names.contains(&"sample type".to_string()));
        assert!(names.contains(&"instrument".to_string()));
        assert_eq!(names.last().unwrap(), "loss of smell");
    }
}
