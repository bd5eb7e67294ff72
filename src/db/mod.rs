pub mod sqlite;
pub mod repository;

pub use sqlite::*;
pub use repository::*;

use thiserror::Error;

/// SQLite's native message prefix for a missing table or view.
const NO_SUCH_TABLE: &str = "no such table: ";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Relation does not exist: {0}")]
    RelationNotFound(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, Some(message)) => {
                if let Some(relation) = message.strip_prefix(NO_SUCH_TABLE) {
                    // Views report their schema-qualified name, e.g. "main.v_observations".
                    let relation = relation.trim().trim_start_matches("main.");
                    return Self::RelationNotFound(relation.to_string());
                }
                if code.code == rusqlite::ErrorCode::ConstraintViolation {
                    return Self::ConstraintViolation(message.clone());
                }
                Self::Sqlite(err)
            }
            _ => Self::Sqlite(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_table_maps_to_relation_not_found() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err: DatabaseError = conn
            .prepare("SELECT * FROM nowhere")
            .map(|_| ())
            .unwrap_err()
            .into();
        assert!(matches!(err, DatabaseError::RelationNotFound(ref name) if name == "nowhere"));
        assert_eq!(err.to_string(), "Relation does not exist: nowhere");
    }

    #[test]
    fn unique_violation_maps_to_constraint() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: DatabaseError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }
}
