use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{opt_uuid_col, optional, uuid_col};
use crate::db::DatabaseError;
use crate::models::Visit;

const VISIT_COLUMNS: &str =
    "id, patient_id, previous_visit_id, days_observed, created_at, updated_at";

fn visit_from_row(row: &Row<'_>) -> rusqlite::Result<Visit> {
    Ok(Visit {
        id: uuid_col(row, 0)?,
        patient_id: uuid_col(row, 1)?,
        previous_visit_id: opt_uuid_col(row, 2)?,
        days_observed: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn insert_visit(conn: &Connection, visit: &Visit) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO visit (id, patient_id, previous_visit_id, days_observed, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            visit.id.to_string(),
            visit.patient_id.to_string(),
            visit.previous_visit_id.map(|id| id.to_string()),
            visit.days_observed,
            visit.created_at,
            visit.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_visit(conn: &Connection, id: &Uuid) -> Result<Option<Visit>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {VISIT_COLUMNS} FROM visit WHERE id = ?1"),
        params![id.to_string()],
        visit_from_row,
    ))
}

/// A subject's visits, most recent first.
pub fn get_visits_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Visit>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VISIT_COLUMNS} FROM visit WHERE patient_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![patient_id.to_string()], visit_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// 1 + length of the previous-visit chain. The walk is bounded by the
/// subject's visit count so a cyclic chain still terminates.
pub fn visit_number(conn: &Connection, visit: &Visit) -> Result<i64, DatabaseError> {
    let bound: i64 = conn.query_row(
        "SELECT COUNT(*) FROM visit WHERE patient_id = ?1",
        params![visit.patient_id.to_string()],
        |row| row.get(0),
    )?;

    let mut number = 1;
    let mut previous = visit.previous_visit_id;
    while let Some(id) = previous {
        if number > bound {
            break;
        }
        match get_visit(conn, &id)? {
            Some(prior) => {
                number += 1;
                previous = prior.previous_visit_id;
            }
            None => break,
        }
    }
    Ok(number)
}
