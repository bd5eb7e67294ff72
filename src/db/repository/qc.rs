use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{enum_col, optional, uuid_col};
use crate::db::DatabaseError;
use crate::models::{QcAnnotation, QcAnnotator};

const ANNOTATOR_COLUMNS: &str =
    "id, name, implementation, value_type, description, is_default, created_at, updated_at";

fn annotator_from_row(row: &Row<'_>) -> rusqlite::Result<QcAnnotator> {
    Ok(QcAnnotator {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        implementation: row.get(2)?,
        value_type: enum_col(row, 3)?,
        description: row.get(4)?,
        is_default: row.get::<_, i32>(5)? != 0,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub fn insert_qc_annotator(conn: &Connection, annotator: &QcAnnotator) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO qc_annotator ({ANNOTATOR_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            annotator.id.to_string(),
            annotator.name,
            annotator.implementation,
            annotator.value_type.as_str(),
            annotator.description,
            annotator.is_default as i32,
            annotator.created_at,
            annotator.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_qc_annotator(conn: &Connection, id: &Uuid) -> Result<Option<QcAnnotator>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {ANNOTATOR_COLUMNS} FROM qc_annotator WHERE id = ?1"),
        params![id.to_string()],
        annotator_from_row,
    ))
}

pub fn find_qc_annotator(conn: &Connection, name: &str)-> Result<Option<QcAnnotator>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {ANNOTATOR_COLUMNS} FROM qc_annotator WHERE name = ?1"),
        params![name],
        annotator_from_row,
    ))
}

pub fn list_default_annotators(conn: &Connection) -> Result<Vec<QcAnnotator>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ANNOTATOR_COLUMNS} FROM qc_annotator WHERE is_default = 1 ORDER BY name"
    ))?;
    let rows = stmt.query_map([], annotator_from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Insert or overwrite the annotation for (annotator, measurement).
pub fn upsert_qc_annotation(conn: &Connection, annotation: &QcAnnotation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO qc_annotation (id, annotator_id, array_data_id, value, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (annotator_id, array_data_id)
         DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![
            annotation.id.to_string(),
            annotation.annotator_id.to_string(),
            annotation.array_data_id.to_string(),
            annotation.value,
            annotation.created_at,
            annotation.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_annotations_for(
    conn: &Connection,
    array_data_id: &Uuid,
) -> Result<Vec<QcAnnotation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, annotator_id, array_data_id, value, created_at, updated_at
         FROM qc_annotation WHERE array_data_id = ?1 ORDER BY created_at",
    )?;
    let rows = stmt.query_map(params![array_data_id.to_string()], |row| {
        Ok(QcAnnotation {
            id: uuid_col(row, 0)?,
            annotator_id: uuid_col(row, 1)?,
            array_data_id: uuid_col(row, 2)?,
            value: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}
