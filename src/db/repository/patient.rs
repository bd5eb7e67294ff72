use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{opt_uuid_col, optional, uuid_col};
use crate::db::DatabaseError;
use crate::models::Patient;

const PATIENT_COLUMNS: &str = "patient_id, patient_cid, center_id, created_at, updated_at";

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        patient_id: uuid_col(row, 0)?,
        patient_cid: opt_uuid_col(row, 1)?,
        center_id: uuid_col(row, 2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patient (patient_id, patient_cid, center_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            patient.patient_id.to_string(),
            patient.patient_cid.map(|id| id.to_string()),
            patient.center_id.to_string(),
            patient.created_at,
            patient.updated_at,
        ],
    )?;
    Ok(())
}

/// Subject with this global id, if it belongs to `center_id`.
pub fn find_patient_by_id(
    conn: &Connection,
    patient_id: &Uuid,
    center_id: &Uuid,
) -> Result<Option<Patient>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patient WHERE patient_id = ?1 AND center_id = ?2"),
        params![patient_id.to_string(), center_id.to_string()],
        patient_from_row,
    ))
}

/// Subject with this centre-local code.
pub fn find_patient_by_cid(
    conn: &Connection,
    patient_cid: &Uuid,
    center_id: &Uuid,
) -> Result<Option<Patient>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patient WHERE patient_cid = ?1 AND center_id = ?2"),
        params![patient_cid.to_string(), center_id.to_string()],
        patient_from_row,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::{insert_center, DatabaseError};
    use crate::models::Center;

    fn setup() -> (Connection, Center) {
        let conn = open_memory_database().unwrap();
        let center = Center::new("SSEC", "US");
        insert_center(&conn, &center).unwrap();
        (conn, center)
    }

    #[test]
    fn lookup_is_scoped_to_center() {
        let (conn, center) = setup();
        let other = Center::new("Other", "FR");
        insert_center(&conn, &other).unwrap();

        let patient = Patient::new(Uuid::new_v4(), Some(Uuid::new_v4()), center.id);
        insert_patient(&conn, &patient).unwrap();

        assert!(find_patient_by_id(&conn, &patient.patient_id, &center.id).unwrap().is_some());
        assert!(find_patient_by_id(&conn, &patient.patient_id, &other.id).unwrap().is_none());
        let cid = patient.patient_cid.unwrap();
        assert_eq!(
            find_patient_by_cid(&conn, &cid, &center.id).unwrap().unwrap().patient_id,
            patient.patient_id
        );
    }

    #[test]
    fn cid_unique_per_center() {
        let (conn, center) = setup();
        let cid = Uuid::new_v4();
        insert_patient(&conn, &Patient::new(Uuid::new_v4(), Some(cid), center.id)).unwrap();
        let err = insert_patient(&conn, &Patient::new(Uuid::new_v4(), Some(cid), center.id))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }
}
