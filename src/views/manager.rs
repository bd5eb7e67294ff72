use rusqlite::Connection;

use super::definitions::ViewKind;
use super::sql::{create_view, drop_relation, select_all, QueryResult};
use super::ViewError;
use crate::db::with_savepoint;

/// Options for a rebuild.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Read each rebuilt view back and fail on error.
    pub check: bool,
    /// Row bound for the check read.
    pub limit: Option<usize>,
    /// Observable names left out of the visit pivot.
    pub exclusions: Vec<String>,
}

/// `kind` and its transitive dependencies, dependencies first, each once.
pub fn rebuild_order(kind: ViewKind) -> Vec<ViewKind> {
    fn visit(kind: ViewKind, order: &mut Vec<ViewKind>) {
        if order.contains(&kind) {
            return;
        }
        for dep in kind.dependencies() {
            visit(*dep, order);
        }
        order.push(kind);
    }

    let mut order = Vec::new();
    visit(kind, &mut order);
    order
}

/// Views whose defining query reads `kind`, directly or transitively.
pub fn dependents(kind: ViewKind) -> Vec<ViewKind> {
    ViewKind::ALL
        .into_iter()
        .filter(|other| *other != kind && rebuild_order(*other).contains(&kind))
        .collect()
}

/// Rebuild `kind` after its dependencies. All drops and creates share one
/// savepoint, so a failure restores the views present before the call.
///
/// Returns the check read of `kind` itself when `options.check` is set.
pub fn update_view(
    conn: &Connection,
    kind: ViewKind,
    options: &UpdateOptions,
) -> Result<Option<QueryResult>, ViewError> {
    let order = rebuild_order(kind);
    with_savepoint(conn, "update_view", |conn| {
        let mut checked = None;
        for view in &order {
            let sql = view.create_sql(conn, &options.exclusions)?;
            drop_relation(conn, view.name())?;
            checked = create_view(conn, view.name(), &sql, options.check, options.limit)?;
            tracing::debug!(view = %view, "View rebuilt");
        }
        tracing::info!(view = %kind, rebuilt = order.len(), check = options.check, "View updated");
        Ok(checked)
    })
}

/// Drop `kind`, and with `drop_dependencies` every view it reads from.
/// Absent views are skipped silently.
pub fn drop_view(conn: &Connection, kind: ViewKind, drop_dependencies: bool) -> Result<(), ViewError> {
    if drop_dependencies {
        for dep in kind.dependencies() {
            drop_view(conn, *dep, true)?;
        }
    }
    drop_relation(conn, kind.name())?;
    tracing::info!(view = %kind, drop_dependencies, "View dropped");
    let stale = dependents(kind);
    if !stale.is_empty() {
        let stale: Vec<&str> = stale.iter().map(|v| v.name()).collect();
        tracing::warn!(view = %kind, ?stale, "Dependent views unreadable until rebuilt");
    }
    Ok(())
}

/// Read a view. An absent view is `RelationNotFound`, never an empty result.
pub fn query_view(conn: &Connection, kind: ViewKind, limit: Option<usize>) -> Result<QueryResult, ViewError> {
    select_all(conn, kind.name(), limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::pipeline::import::{ingest, FsBlobStore, Upload};
    use crate::test_util::{meta_csv, seeded, spectra_csv};
    use serde_json::Value;

    fn populated(rows: usize) -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let (conn, seed) = seeded();
        ingest(
            &conn,
            &store,
            &Upload::new("meta.csv", meta_csv(&seed, rows, None)),
            &Upload::new("spectra.csv", spectra_csv(rows)),
            &seed.center,
            &IngestConfig::default(),
            false,
        )
        .unwrap();
        (dir, conn)
    }

    fn checked() -> UpdateOptions {
        UpdateOptions {
            check: true,
            limit: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn rebuild_order_is_dependencies_first() {
        assert_eq!(
            rebuild_order(ViewKind::FullPatient),
            vec![ViewKind::Observations, ViewKind::VisitObservations, ViewKind::FullPatient]
        );
        assert_eq!(rebuild_order(ViewKind::Observations), vec![ViewKind::Observations]);
    }

    #[test]
    fn dependents_are_transitive() {
        assert_eq!(
            dependents(ViewKind::Observations),
            vec![ViewKind::VisitObservations, ViewKind::FullPatient]
        );
        assert!(dependents(ViewKind::FullPatient).is_empty());
    }

    #[test]
    fn update_recreates_dropped_ancestors() {
        let (_dir, conn) = populated(3);
        update_view(&conn, ViewKind::FullPatient, &UpdateOptions::default()).unwrap();

        drop_view(&conn, ViewKind::Observations, false).unwrap();
        assert!(matches!(
            query_view(&conn, ViewKind::FullPatient, None),
            Err(ViewError::RelationNotFound(_))
        ));

        update_view(&conn, ViewKind::FullPatient, &checked()).unwrap();
        assert_eq!(query_view(&conn, ViewKind::Observations, None).unwrap().len(), 5);
        assert_eq!(query_view(&conn, ViewKind::FullPatient, None).unwrap().len(), 3);
    }

    #[test]
    fn dropped_view_query_is_relation_not_found() {
        let (_dir, conn) = populated(2);
        update_view(&conn, ViewKind::VisitObservations, &UpdateOptions::default()).unwrap();
        drop_view(&conn, ViewKind::VisitObservations, false).unwrap();

        let err = query_view(&conn, ViewKind::VisitObservations, None).unwrap_err();
        assert!(matches!(err, ViewError::RelationNotFound(name) if name == "v_visit_observations"));
        // The dependency survives a plain drop.
        assert!(query_view(&conn, ViewKind::Observations, None).is_ok());
    }

    #[test]
    fn drop_is_idempotent_and_can_cascade() {
        let (_dir, conn) = populated(1);
        update_view(&conn, ViewKind::FullPatient, &UpdateOptions::default()).unwrap();

        drop_view(&conn, ViewKind::FullPatient, true).unwrap();
        drop_view(&conn, ViewKind::FullPatient, true).unwrap();
        for kind in ViewKind::ALL {
            assert!(matches!(query_view(&conn, kind, None), Err(ViewError::RelationNotFound(_))));
        }
    }

    #[test]
    fn check_returns_bounded_rows() {
        let (_dir, conn) = populated(4);
        let rows = update_view(&conn, ViewKind::FullPatient, &checked()).unwrap().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows.column_index("data").is_some());
        assert!(rows.column_index("fever").is_some());
    }

    #[test]
    fn pivot_casts_float_observations() {
        let (_dir, conn) = populated(2);
        update_view(&conn, ViewKind::VisitObservations, &UpdateOptions::default()).unwrap();
        let result = query_view(&conn, ViewKind::VisitObservations, None).unwrap();
        let col = result.column_index("body_temperature").unwrap();
        assert!(result.rows.iter().all(|r| matches!(r[col], Value::Number(_))));
    }

    #[test]
    fn exclusions_remove_pivot_columns() {
        let (_dir, conn) = populated(1);
        let options = UpdateOptions {
            exclusions: vec!["fever".into()],
            ..Default::default()
        };
        update_view(&conn, ViewKind::VisitObservations, &options).unwrap();
        let result = query_view(&conn, ViewKind::VisitObservations, None).unwrap();
        assert_eq!(result.columns, vec!["visit_id", "body_temperature"]);
    }

    #[test]
    fn views_are_stale_until_rebuilt() {
        let (_dir, conn) = populated(1);
        update_view(&conn, ViewKind::VisitObservations, &UpdateOptions::default()).unwrap();

        let mut extra = crate::models::Observable::new(
            crate::models::ObservableCategory::Vitals,
            "heart_rate",
            crate::models::ValueType::Int,
        );
        extra.clean().unwrap();
        crate::db::repository::insert_observable(&conn, &extra).unwrap();

        let before = query_view(&conn, ViewKind::VisitObservations, None).unwrap();
        assert!(before.column_index("heart_rate").is_none());

        update_view(&conn, ViewKind::VisitObservations, &UpdateOptions::default()).unwrap();
        let after = query_view(&conn, ViewKind::VisitObservations, None).unwrap();
        assert!(after.column_index("heart_rate").is_some());
    }
}
