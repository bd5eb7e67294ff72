use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{opt_uuid_col, optional, uuid_col};
use crate::db::DatabaseError;
use crate::models::Instrument;

pub fn insert_instrument(conn: &Connection, instrument: &Instrument) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO instrument (id, cid, manufacturer, model, serial_number, center_id,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            instrument.id.to_string(),
            instrument.cid,
            instrument.manufacturer,
            instrument.model,
            instrument.serial_number,
            instrument.center_id.map(|id| id.to_string()),
            instrument.created_at,
            instrument.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_instrument(conn: &Connection, id: &Uuid) -> Result<Option<Instrument>, DatabaseError> {
    optional(conn.query_row(
        "SELECT id, cid, manufacturer, model, serial_number, center_id, created_at, updated_at
         FROM instrument WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok(Instrument {
                id: uuid_col(row, 0)?,
                cid: row.get(1)?,
                manufacturer: row.get(2)?,
                model: row.get(3)?,
                serial_number: row.get(4)?,
                center_id: opt_uuid_col(row, 5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        },
    ))
}
