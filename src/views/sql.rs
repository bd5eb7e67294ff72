//! Raw SQL helpers for view DDL and untyped reads.

use std::sync::LazyLock;

use base64::Engine;
use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value};

use super::ViewError;
use crate::db::DatabaseError;

static INSECURE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^_a-zA-Z0-9]").unwrap());

/// Names interpolated into DDL must be plain identifiers.
pub fn secure_name(name: &str) -> Result<(), ViewError> {
    if name.is_empty() || INSECURE_CHARS.is_match(name) {
        return Err(ViewError::InsecureName(name.to_string()));
    }
    Ok(())
}

/// Column names plus untyped rows of one read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Rows as column-keyed maps, column order preserved.
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(base64::engine::general_purpose::STANDARD.encode(b)),
    }
}

/// Run one statement and collect every row it returns.
pub fn run_query(conn: &Connection, sql: &str) -> Result<QueryResult, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(json_value(row.get_ref(i)?));
        }
        rows.push(values);
    }
    Ok(QueryResult { columns, rows })
}

/// `SELECT *` from a table or view, optionally bounded.
pub fn select_all(conn: &Connection, relation: &str, limit: Option<usize>) -> Result<QueryResult, ViewError> {
    secure_name(relation)?;
    let sql = match limit {
        Some(n) => format!("SELECT * FROM {relation} LIMIT {n}"),
        None => format!("SELECT * FROM {relation}"),
    };
    Ok(run_query(conn, &sql)?)
}

/// Drop a view if present. Dropping an absent view is not an error.
pub fn drop_relation(conn: &Connection, view: &str) -> Result<(), ViewError> {
    secure_name(view)?;
    conn.execute_batch(&format!("DROP VIEW IF EXISTS {view}"))
        .map_err(DatabaseError::from)?;
    Ok(())
}

/// Execute `create_sql` and, when `check` is set, read the new view back so
/// latent errors surface now rather than at first use.
pub fn create_view(
    conn: &Connection,
    view: &str,
    create_sql: &str,
    check: bool,
    limit: Option<usize>,
) -> Result<Option<QueryResult>, ViewError> {
    secure_name(view)?;
    conn.execute_batch(create_sql).map_err(DatabaseError::from)?;
    if !check {
        return Ok(None);
    }
    select_all(conn, view, limit)
        .map(Some)
        .map_err(|e| ViewError::Integrity {
            view: view.to_string(),
            reason: e.to_string(),
        })
}
