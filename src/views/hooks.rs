//! Mutation hooks: writes to tables a view reads from, followed by a rebuild
//! of the affected views in the same savepoint.

use rusqlite::Connection;

use super::definitions::ViewKind;
use super::manager::{update_view, UpdateOptions};
use super::ViewError;
use crate::db::{repository, with_savepoint};
use crate::models::Observable;

/// Views whose columns depend on the set of observables. Rebuilding the last
/// one rebuilds its ancestors too.
pub const OBSERVABLE_DEPENDENT_VIEWS: &[ViewKind] = &[ViewKind::FullPatient];

/// Clean and insert an observable, then rebuild the views that pivot on it.
/// A failed rebuild rolls the insert back.
pub fn save_observable(
    conn: &Connection,
    observable: &mut Observable,
    options: &UpdateOptions,
) -> Result<(), ViewError> {
    observable.clean()?;
    if repository::find_observable_by_name(conn, &observable.name)?.is_some() {
        return Err(ViewError::Validation(format!(
            "Observable '{}' already exists",
            observable.name
        )));
    }
    with_savepoint::<_, ViewError, _>(conn, "save_observable", |conn| {
        repository::insert_observable(conn, observable)?;
        for view in OBSERVABLE_DEPENDENT_VIEWS {
            update_view(conn, *view, options)?;
        }
        Ok(())
    })?;
    tracing::info!(observable = %observable.name, "Observable saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::count_rows;
    use crate::models::{ObservableCategory, ValueType};
    use crate::test_util::seeded;
    use crate::views::query_view;

    #[test]
    fn new_observable_appears_in_pivot() {
        let (conn, _seed) = seeded();
        let mut rate = Observable::new(ObservableCategory::Vitals, "heart_rate", ValueType::Int);
        save_observable(&conn, &mut rate, &UpdateOptions::default()).unwrap();

        assert_eq!(rate.alias, "heart rate");
        let pivot = query_view(&conn, ViewKind::VisitObservations, None).unwrap();
        assert!(pivot.column_index("heart_rate").is_some());
        assert!(query_view(&conn, ViewKind::FullPatient, None).is_ok());
    }

    #[test]
    fn insecure_name_rolls_back_insert() {
        let (conn, _seed) = seeded();
        let before = count_rows(&conn, "observable").unwrap();
        let mut bad = Observable::new(ObservableCategory::Symptom, "loss-of-taste", ValueType::Bool);

        let err = save_observable(&conn, &mut bad, &UpdateOptions::default()).unwrap_err();
        assert!(matches!(err, ViewError::InsecureName(_)));
        assert_eq!(count_rows(&conn, "observable").unwrap(), before);
    }

    #[test]
    fn keyword_name_is_quoted_in_pivot() {
        let (conn, _seed) = seeded();
        let mut group = Observable::new(ObservableCategory::PatientInfo, "group", ValueType::Str);
        save_observable(&conn, &mut group, &UpdateOptions::default()).unwrap();

        let pivot = query_view(&conn, ViewKind::VisitObservations, None).unwrap();
        assert!(pivot.column_index("group").is_some());
    }

    #[test]
    fn duplicate_name_rejected_before_insert() {
        let (conn, _seed) = seeded();
        let before = count_rows(&conn, "observable").unwrap();
        let mut again = Observable::new(ObservableCategory::Symptom, "FEVER", ValueType::Bool);

        let err = save_observable(&conn, &mut again, &UpdateOptions::default()).unwrap_err();
        assert!(matches!(err, ViewError::Validation(msg) if msg.contains("already exists")));
        assert_eq!(count_rows(&conn, "observable").unwrap(), before);
    }

    #[test]
    fn blank_name_is_validation_error() {
        let (conn, _seed) = seeded();
        let mut blank = Observable::new(ObservableCategory::Symptom, "  ", ValueType::Bool);
        assert!(matches!(
            save_observable(&conn, &mut blank, &UpdateOptions::default()),
            Err(ViewError::Validation(_))
        ));
    }
}
