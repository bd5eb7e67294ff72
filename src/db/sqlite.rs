use std::path::Path;

use rusqlite::Connection;

use super::DatabaseError;

/// Open a SQLite connection to the given path and run migrations
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DatabaseError::MigrationFailed {
            version: 0,
            reason: format!("cannot create {}: {e}", parent.display()),
        })?;
    }
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA foreign_keys=ON;"
    )?;
    Ok(())
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![
        (1, include_str!("../../resources/migrations/001_initial.sql")),
    ];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql).map_err(|e| DatabaseError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get::<_, i64>(0),
    )
    .unwrap_or(0)
}

/// Count rows of a table. Table names are compile-time constants at every call site.
pub fn count_rows(conn: &Connection, table: &str) -> Result<i64, DatabaseError> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count)
}

/// Run `f` inside a named SAVEPOINT.
///
/// Unlike `Connection::unchecked_transaction`, savepoints nest, so this can be
/// used both at top level and inside a caller's open transaction. On error the
/// savepoint is rolled back and released before the error is returned.
pub fn with_savepoint<T, E, F>(conn: &Connection, name: &str, f: F) -> Result<T, E>
where
    E: From<DatabaseError>,
    F: FnOnce(&Connection) -> Result<T, E>,
{
    conn.execute_batch(&format!("SAVEPOINT {name}"))
        .map_err(DatabaseError::from)?;

    match f(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))
                .map_err(DatabaseError::from)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) =
                conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))
            {
                tracing::warn!(savepoint = name, error = %rollback_err, "Savepoint rollback failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_initializes_all_tables() {
        let conn = open_memory_database().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        // 12 entity tables + schema_version
        assert_eq!(count, 13);
    }

    #[test]
    fn schema_version_is_current() {
        let conn = open_memory_database().unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn migration_idempotent() {
        let conn = open_memory_database().unwrap();
        let result = run_migrations(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn foreign_keys_enabled() {
        let conn = open_memory_database().unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn open_database_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/biodb.sqlite3");
        open_database(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn savepoint_rolls_back_on_error() {
        let conn = open_memory_database().unwrap();
        let result: Result<(), DatabaseError> = with_savepoint(&conn, "sp_test", |c| {
            c.execute(
                "INSERT INTO bio_sample_type (id, name) VALUES ('x', 'swab')",
                [],
            )?;
            Err(DatabaseError::ConstraintViolation("forced".into()))
        });
        assert!(result.is_err());
        assert_eq!(count_rows(&conn, "bio_sample_type").unwrap(), 0);
    }

    #[test]
    fn savepoints_nest() {
        let conn = open_memory_database().unwrap();
        with_savepoint::<_, DatabaseError, _>(&conn, "outer", |c| {
            c.execute("INSERT INTO bio_sample_type (id, name) VALUES ('a', 'urine')", [])?;
            let inner: Result<(), DatabaseError> = with_savepoint(c, "inner", |c| {
                c.execute("INSERT INTO bio_sample_type (id, name) VALUES ('b', 'blood')", [])?;
                Err(DatabaseError::ConstraintViolation("inner".into()))
            });
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();
        assert_eq!(count_rows(&conn, "bio_sample_type").unwrap(), 1);
    }
}
