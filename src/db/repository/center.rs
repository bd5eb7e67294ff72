use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{optional, uuid_col};
use crate::db::DatabaseError;
use crate::models::Center;

const CENTER_COLUMNS: &str = "id, name, country, created_at, updated_at";

fn center_from_row(row: &Row<'_>) -> rusqlite::Result<Center> {
    Ok(Center {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        country: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub fn insert_center(conn: &Connection, center: &Center) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO center (id, name, country, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            center.id.to_string(),
            center.name,
            center.country,
            center.created_at,
            center.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_center(conn: &Connection, id: &Uuid) -> Result<Option<Center>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {CENTER_COLUMNS} FROM center WHERE id = ?1"),
        params![id.to_string()],
        center_from_row,
    ))
}

/// Look a centre up by id or (case-insensitive) name.
pub fn find_center(conn: &Connection, id_or_name: &str) -> Result<Option<Center>, DatabaseError> {
    if let Ok(id) = Uuid::parse_str(id_or_name.trim()) {
        if let Some(center) = get_center(conn, &id)? {
            return Ok(Some(center));
        }
    }
    optional(conn.query_row(
        &format!("SELECT {CENTER_COLUMNS} FROM center WHERE lower(name) = lower(?1) LIMIT 1"),
        params![id_or_name.trim()],
        center_from_row,
    ))
}
