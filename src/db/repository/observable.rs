use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{enum_col, opt_uuid_col, optional, uuid_col};
use crate::db::DatabaseError;
use crate::models::{Observable, Observation};

const OBSERVABLE_COLUMNS: &str = "id, category, name, description, alias, value_class,
    value_choices, center_id, created_at, updated_at";

fn observable_from_row(row: &Row<'_>) -> rusqlite::Result<Observable> {
    Ok(Observable {
        id: uuid_col(row, 0)?,
        category: enum_col(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        alias: row.get(4)?,
        value_class: enum_col(row, 5)?,
        value_choices: row.get(6)?,
        center_id: opt_uuid_col(row, 7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Insert a cleaned observable. Case-insensitive name/alias clashes surface
/// as `ConstraintViolation`.
pub fn insert_observable(conn: &Connection, observable: &Observable) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO observable ({OBSERVABLE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            observable.id.to_string(),
            observable.category.as_str(),
            observable.name,
            observable.description,
            observable.alias,
            observable.value_class.as_str(),
            observable.value_choices,
            observable.center_id.map(|id| id.to_string()),
            observable.created_at,
            observable.updated_at,
        ],
    )?;
    Ok(())
}

pub fn find_observable_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<Observable>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {OBSERVABLE_COLUMNS} FROM observable WHERE lower(name) = lower(?1)"),
        params![name],
        observable_from_row,
    ))
}

/// All observables in creation order.
pub fn list_observables(conn: &Connection) -> Result<Vec<Observable>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OBSERVABLE_COLUMNS} FROM observable ORDER BY created_at, name"
    ))?;
    let rows = stmt.query_map([], observable_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Global observables plus those scoped to `center_id`.
pub fn visible_observables(
    conn: &Connection,
    center_id: &Uuid,
) -> Result<Vec<Observable>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OBSERVABLE_COLUMNS} FROM observable
         WHERE center_id IS NULL OR center_id = ?1
         ORDER BY created_at, name"
    ))?;
    let rows = stmt.query_map(params![center_id.to_string()], observable_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn insert_observation(conn: &Connection, observation: &Observation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO observation (id, visit_id, observable_id, days_observed, observable_value,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            observation.id.to_string(),
            observation.visit_id.to_string(),
            observation.observable_id.to_string(),
            observation.days_observed,
            observation.observable_value,
            observation.created_at,
            observation.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_observations_for_visit(
    conn: &Connection,
    visit_id: &Uuid,
) -> Result<Vec<Observation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, visit_id, observable_id, days_observed, observable_value, created_at, updated_at
         FROM observation WHERE visit_id = ?1 ORDER BY created_at",
    )?;
    let rows = stmt.query_map(params![visit_id.to_string()], |row| {
        Ok(Observation {
            id: uuid_col(row, 0)?,
            visit_id: uuid_col(row, 1)?,
            observable_id: uuid_col(row, 2)?,
            days_observed: row.get(3)?,
            observable_value: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::insert_center;
    use crate::models::{Center, ObservableCategory, ValueType};

    fn observable(name: &str, center_id: Option<Uuid>) -> Observable {
        let mut obs = Observable::new(ObservableCategory::Symptom, name, ValueType::Bool);
        obs.center_id = center_id;
        obs.clean().unwrap();
        obs
    }

    #[test]
    fn visibility_is_global_plus_own_center() {
        let conn = open_memory_database().unwrap();
        let mine = Center::new("Mine", "UK");
        let theirs = Center::new("Theirs", "US");
        insert_center(&conn, &mine).unwrap();
        insert_center(&conn, &theirs).unwrap();

        insert_observable(&conn, &observable("fever", None)).unwrap();
        insert_observable(&conn, &observable("cough", Some(mine.id))).unwrap();
        insert_observable(&conn, &observable("rash", Some(theirs.id))).unwrap();

        let names: Vec<String> = visible_observables(&conn, &mine.id)
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"fever".to_string()));
        assert!(names.contains(&"cough".to_string()));
        assert_eq!(list_observables(&conn).unwrap().len(), 3);
    }

    #[test]
    fn names_unique_ignoring_case() {
        let conn = open_memory_database().unwrap();
        insert_observable(&conn, &observable("fever", None)).unwrap();
        let err = insert_observable(&conn, &observable("FEVER", None)).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn enum_columns_round_trip() {
        let conn = open_memory_database().unwrap();
        let obs = observable("loss_of_taste", None);
        insert_observable(&conn, &obs).unwrap();
        let found = find_observable_by_name(&conn, "Loss_Of_Taste").unwrap().unwrap();
        assert_eq!(found.category, ObservableCategory::Symptom);
        assert_eq!(found.value_class, ValueType::Bool);
        assert_eq!(found.alias, "loss of taste");
    }
}
