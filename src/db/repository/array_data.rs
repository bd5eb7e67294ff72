use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{optional, uuid_col};
use crate::db::DatabaseError;
use crate::models::{ArrayData, ArrayMeasurementType};

pub fn insert_measurement_type(
    conn: &Connection,
    kind: &ArrayMeasurementType,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO array_measurement_type (id, name) VALUES (?1, ?2)",
        params![kind.id.to_string(), kind.name],
    )?;
    Ok(())
}

pub fn find_measurement_type(
    conn: &Connection,
    name: &str,
) -> Result<Option<ArrayMeasurementType>, DatabaseError> {
    optional(conn.query_row(
        "SELECT id, name FROM array_measurement_type WHERE name = ?1",
        params![name.trim().to_lowercase()],
        |row| {
            Ok(ArrayMeasurementType {
                id: uuid_col(row, 0)?,
                name: row.get(1)?,
            })
        },
    ))
}

const ARRAY_DATA_COLUMNS: &str = "id, instrument_id, bio_sample_id, measurement_type_id,
    measurement_id, acquisition_time, resolution, power, temperature, pressure, humidity, date,
    data, checksum, n_points, created_at, updated_at";

fn array_data_from_row(row: &Row<'_>) -> rusqlite::Result<ArrayData> {
    Ok(ArrayData {
        id: uuid_col(row, 0)?,
        instrument_id: uuid_col(row, 1)?,
        bio_sample_id: uuid_col(row, 2)?,
        measurement_type_id: uuid_col(row, 3)?,
        measurement_id: row.get(4)?,
        acquisition_time: row.get(5)?,
        resolution: row.get(6)?,
        power: row.get(7)?,
        temperature: row.get(8)?,
        pressure: row.get(9)?,
        humidity: row.get(10)?,
        date: row.get(11)?,
        data: row.get(12)?,
        checksum: row.get(13)?,
        n_points: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

pub fn insert_array_data(conn: &Connection, data: &ArrayData) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO array_data ({ARRAY_DATA_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        params![
            data.id.to_string(),
            data.instrument_id.to_string(),
            data.bio_sample_id.to_string(),
            data.measurement_type_id.to_string(),
            data.measurement_id,
            data.acquisition_time,
            data.resolution,
            data.power,
            data.temperature,
            data.pressure,
            data.humidity,
            data.date,
            data.data,
            data.checksum,
            data.n_points,
            data.created_at,
            data.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_array_data(conn: &Connection, id: &Uuid) -> Result<Option<ArrayData>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {ARRAY_DATA_COLUMNS} FROM array_data WHERE id = ?1"),
        params![id.to_string()],
        array_data_from_row,
    ))
}

pub fn list_array_data(conn: &Connection) -> Result<Vec<ArrayData>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ARRAY_DATA_COLUMNS} FROM array_data ORDER BY created_at"
    ))?;
    let rows = stmt.query_map([], array_data_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Every blob name referenced by a measurement.
pub fn list_blob_names(conn: &Connection) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT data FROM array_data ORDER BY data")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}
