use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{optional, uuid_col};
use crate::db::DatabaseError;
use crate::models::{BioSample, BioSampleType};

pub fn insert_bio_sample_type(conn: &Connection, kind: &BioSampleType) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO bio_sample_type (id, name) VALUES (?1, ?2)",
        params![kind.id.to_string(), kind.name],
    )?;
    Ok(())
}

/// Look a sample type up by name; the stored names are lower case.
pub fn find_bio_sample_type(
    conn: &Connection,
    name: &str,
) -> Result<Option<BioSampleType>, DatabaseError> {
    optional(conn.query_row(
        "SELECT id, name FROM bio_sample_type WHERE name = ?1",
        params![name.trim().to_lowercase()],
        |row| {
            Ok(BioSampleType {
                id: uuid_col(row, 0)?,
                name: row.get(1)?,
            })
        },
    ))
}

fn bio_sample_from_row(row: &Row<'_>) -> rusqlite::Result<BioSample> {
    Ok(BioSample {
        id: uuid_col(row, 0)?,
        visit_id: uuid_col(row, 1)?,
        sample_type_id: uuid_col(row, 2)?,
        sample_cid: row.get(3)?,
        sample_study_id: row.get(4)?,
        sample_study_name: row.get(5)?,
        sample_processing: row.get(6)?,
        sample_extraction: row.get(7)?,
        sample_extraction_tube: row.get(8)?,
        centrifuge_time: row.get(9)?,
        centrifuge_rpm: row.get(10)?,
        freezing_temp: row.get(11)?,
        thawing_temp: row.get(12)?,
        thawing_time: row.get(13)?,
        freezing_time: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

pub fn insert_bio_sample(conn: &Connection, sample: &BioSample) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO bio_sample (id, visit_id, sample_type_id, sample_cid, sample_study_id,
         sample_study_name, sample_processing, sample_extraction, sample_extraction_tube,
         centrifuge_time, centrifuge_rpm, freezing_temp, thawing_temp, thawing_time, freezing_time,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            sample.id.to_string(),
            sample.visit_id.to_string(),
            sample.sample_type_id.to_string(),
            sample.sample_cid,
            sample.sample_study_id,
            sample.sample_study_name,
            sample.sample_processing,
            sample.sample_extraction,
            sample.sample_extraction_tube,
            sample.centrifuge_time,
            sample.centrifuge_rpm,
            sample.freezing_temp,
            sample.thawing_temp,
            sample.thawing_time,
            sample.freezing_time,
            sample.created_at,
            sample.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_bio_sample(conn: &Connection, id: &Uuid) -> Result<Option<BioSample>, DatabaseError> {
    optional(conn.query_row(
        "SELECT id, visit_id, sample_type_id, sample_cid, sample_study_id, sample_study_name,
         sample_processing, sample_extraction, sample_extraction_tube, centrifuge_time,
         centrifuge_rpm, freezing_temp, thawing_temp, thawing_time, freezing_time,
         created_at, updated_at
         FROM bio_sample WHERE id = ?1",
        params![id.to_string()],
        bio_sample_from_row,
    ))
}
