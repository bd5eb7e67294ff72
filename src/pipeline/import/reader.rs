//! Tabular reader: CSV, XLSX and JSONL uploads into normalized tables.
//!
//! Normalization runs in a fixed order: column names are lower-cased, index
//! aliases resolved, index cells kept as text, null tokens collapsed to
//! `CellValue::Null`, and boolean aliases coerced. Remaining cells are
//! inferred as integers, finite floats or text.

use std::collections::HashSet;
use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, DataType, Reader, Xlsx};
use uuid::Uuid;

use super::codec::{decode, ArrayPayload};
use super::format::{FileFormat, Upload};
use super::table::{MeasurementRow, MeasurementTable, Table, TableRow};
use super::ImportError;
use crate::models::CellValue;

pub const DEFAULT_INDEX_COLUMN: &str = "patient_id";

/// Identity columns and the spellings accepted for them (after lower-casing).
const INDEX_ALIASES: &[(&str, &str)] = &[("patient id", "patient_id"), ("patient cid", "patient_cid")];

/// Compared case-insensitively after trimming.
const NULL_TOKENS: &[&str] = &[
    "", "unknown", "na", "none", "n/a", "nan", "-nan", "null", "<na>", "#n/a", "#n/a n/a", "#na",
    "-1.#ind", "-1.#qnan", "1.#ind", "1.#qnan",
];

/// Header plus rectangular rows, after normalization.
#[derive(Debug, Default)]
struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    fn position(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }
}

pub fn is_null_token(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    NULL_TOKENS.contains(&lowered.as_str())
}

fn normalize_header(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    INDEX_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lowered)
}

fn is_index_column(header: &str) -> bool {
    INDEX_ALIASES.iter().any(|(_, canonical)| *canonical == header)
}

fn coerce_bool(text: &str) -> Option<bool> {
    match text.to_lowercase().as_str() {
        "yes" | "true" => Some(true),
        "no" | "false" => Some(false),
        _ => None,
    }
}

/// Text cell from a CSV/XLSX source.
fn infer_text(raw: &str, index: bool) -> CellValue {
    let text = raw.trim();
    if is_null_token(text) {
        return CellValue::Null;
    }
    if index {
        return CellValue::Text(text.to_string());
    }
    if let Some(b) = coerce_bool(text) {
        return CellValue::Bool(b);
    }
    if let Ok(i) = text.parse::<i64>() {
        return CellValue::Int(i);
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => CellValue::Float(f),
        _ => CellValue::Text(text.to_string()),
    }
}

/// Numeric index cells become integer text, never a float rendering.
fn index_from_number(cell: CellValue) -> CellValue {
    match cell {
        CellValue::Int(i) => CellValue::Text(i.to_string()),
        CellValue::Float(f) if f.is_finite() && f.fract() == 0.0 && f >= 0.0 => {
            CellValue::Text(format!("{}", f as u128))
        }
        CellValue::Float(f) => CellValue::Text(f.to_string()),
        CellValue::Bool(b) => CellValue::Text(b.to_string()),
        other => other,
    }
}

fn normalize_headers(raw: Vec<String>) -> Result<Vec<String>, ImportError> {
    let headers: Vec<String> = raw.iter().map(|h| normalize_header(h)).collect();
    let mut seen = HashSet::new();
    for h in &headers {
        if !seen.insert(h.as_str()) {
            return Err(ImportError::Schema(format!("duplicate column '{h}'")));
        }
    }
    Ok(headers)
}

fn read_csv(bytes: &[u8]) -> Result<RawTable, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let headers = normalize_headers(reader.headers()?.iter().map(str::to_string).collect())?;
    let index_flags: Vec<bool> = headers.iter().map(|h| is_index_column(h)).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            if matches!(e.kind(), csv::ErrorKind::UnequalLengths { .. }) {
                ImportError::Parse(format!("non-rectangular CSV: {e}"))
            } else {
                ImportError::Csv(e)
            }
        })?;
        rows.push(
            record
                .iter()
                .zip(&index_flags)
                .map(|(field, index)| infer_text(field, *index))
                .collect(),
        );
    }
    Ok(RawTable { headers, rows })
}

fn xlsx_cell(cell: &Data, index: bool) -> CellValue {
    let value = match cell {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::String(s) => return infer_text(s, index),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) if f.is_finite() => CellValue::Float(*f),
        Data::Float(_) => CellValue::Null,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) => CellValue::Text(dt.to_string()),
            None => CellValue::Text(cell.to_string()),
        },
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    };
    if index {
        index_from_number(value)
    } else {
        value
    }
}

fn xlsx_header(cell: &Data) -> String {
    match cell {
        Data::Float(f) => format!("{f}"),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn read_xlsx(bytes: &[u8]) -> Result<RawTable, ImportError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::Parse("workbook has no worksheets".into()))??;

    let mut rows_iter = range.rows();
    let Some(header_row) = rows_iter.next() else {
        return Ok(RawTable::default());
    };
    let headers = normalize_headers(header_row.iter().map(xlsx_header).collect())?;
    let index_flags: Vec<bool> = headers.iter().map(|h| is_index_column(h)).collect();

    let mut rows = Vec::new();
    for row in rows_iter {
        let cells: Vec<CellValue> = row
            .iter()
            .zip(&index_flags)
            .map(|(cell, index)| xlsx_cell(cell, *index))
            .collect();
        // Trailing fully-empty rows are an artifact of the sheet's used range.
        if cells.iter().all(CellValue::is_null) {
            continue;
        }
        rows.push(cells);
    }
    Ok(RawTable { headers, rows })
}

fn json_cell(value: serde_json::Value, index: bool) -> Result<CellValue, ImportError> {
    let cell = match value {
        serde_json::Value::Null => CellValue::Null,
        serde_json::Value::Bool(b) => CellValue::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Int(i),
            None => n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Null),
        },
        serde_json::Value::String(s) => {
            if is_null_token(&s) {
                CellValue::Null
            } else if index {
                CellValue::Text(s.trim().to_string())
            } else {
                coerce_bool(s.trim()).map(CellValue::Bool).unwrap_or(CellValue::Text(s))
            }
        }
        other => {
            return Err(ImportError::Parse(format!(
                "nested JSON values are not table cells: {other}"
            )))
        }
    };
    Ok(if index { index_from_number(cell) } else { cell })
}

/// One JSON object per line; the header is the union of keys in first-seen order.
fn read_jsonl(bytes: &[u8]) -> Result<RawTable, ImportError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ImportError::Parse(format!("JSONL is not UTF-8: {e}")))?;

    let mut records = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(line)
            .map_err(|e| ImportError::Parse(format!("line {}: {e}", n + 1)))?;
        let serde_json::Value::Object(map) = value else {
            return Err(ImportError::Parse(format!("line {}: expected a JSON object", n + 1)));
        };
        let normalized: Vec<(String, serde_json::Value)> =
            map.into_iter().map(|(k, v)| (normalize_header(&k), v)).collect();
        records.push(normalized);
    }

    let mut headers: Vec<String> = Vec::new();
    for record in &records {
        for (key, _) in record {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let mut cells = vec![CellValue::Null; headers.len()];
        for (key, value) in record {
            if let Some(pos) = headers.iter().position(|h| *h == key) {
                cells[pos] = json_cell(value, is_index_column(&key))?;
            }
        }
        rows.push(cells);
    }
    Ok(RawTable { headers, rows })
}

fn read_raw(upload: &Upload, format: Option<FileFormat>) -> Result<RawTable, ImportError> {
    match FileFormat::resolve(format, &upload.name)? {
        FileFormat::Csv => read_csv(&upload.bytes),
        FileFormat::Xlsx => read_xlsx(&upload.bytes),
        FileFormat::Jsonl => read_jsonl(&upload.bytes),
    }
}

/// Parse an index cell: UUID text first, then a non-negative integer taken
/// as the UUID's 128-bit value.
pub fn parse_index(cell: &CellValue) -> Result<Uuid, ImportError> {
    let text = match index_from_number(cell.clone()) {
        CellValue::Text(t) => t,
        other => other.to_string(),
    };
    let text = text.trim();
    if let Ok(id) = Uuid::parse_str(text) {
        return Ok(id);
    }
    text.parse::<u128>()
        .map(Uuid::from_u128)
        .map_err(|_| ImportError::Parse(format!("'{text}' is not a valid patient identifier")))
}

fn require_index(raw: &RawTable, index_column: &str) -> Result<usize, ImportError> {
    raw.position(index_column).ok_or_else(|| {
        ImportError::Schema(format!("missing required column '{index_column}'"))
    })
}

/// Read a meta-data table keyed by `index_column`.
///
/// Rows whose index cell is null are dropped and counted in `dropped_rows`.
pub fn read_table(
    upload: &Upload,
    format: Option<FileFormat>,
    index_column: &str,
) -> Result<Table, ImportError> {
    let index_column = normalize_header(index_column);
    let raw = read_raw(upload, format)?;
    let idx = require_index(&raw, &index_column)?;

    let columns: Vec<String> = raw
        .headers
        .iter()
        .filter(|h| **h != index_column)
        .cloned()
        .collect();

    let mut rows = Vec::with_capacity(raw.rows.len());
    let mut dropped_rows = 0;
    for (n, cells) in raw.rows.into_iter().enumerate() {
        if cells[idx].is_null() {
            dropped_rows += 1;
            tracing::warn!(file = %upload.name, row = n + 1, "Row with null index dropped");
            continue;
        }
        let index = parse_index(&cells[idx])?;
        let cells = raw
            .headers
            .iter()
            .cloned()
            .zip(cells)
            .filter(|(h, _)| *h != index_column)
            .collect();
        rows.push(TableRow { index, cells });
    }

    tracing::debug!(
        file = %upload.name,
        rows = rows.len(),
        columns = columns.len(),
        dropped_rows,
        "Meta-data table read"
    );

    Ok(Table {
        index_column,
        columns,
        rows,
        dropped_rows,
    })
}

/// Read a measurement table: header cells after the index column are the
/// independent axis, each row's cells the dependent values.
pub fn read_measurement_table(
    upload: &Upload,
    format: Option<FileFormat>,
    index_column: &str,
) -> Result<MeasurementTable, ImportError> {
    let index_column = normalize_header(index_column);
    let raw = read_raw(upload, format)?;
    let idx = require_index(&raw, &index_column)?;

    let wavelength = raw
        .headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != idx)
        .map(|(_, h)| {
            h.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .ok_or_else(|| ImportError::Parse(format!("measurement column '{h}' is not numeric")))
        })
        .collect::<Result<Vec<f64>, _>>()?;

    let mut rows = Vec::with_capacity(raw.rows.len());
    let mut dropped_rows = 0;
    for (n, cells) in raw.rows.into_iter().enumerate() {
        if cells[idx].is_null() {
            dropped_rows += 1;
            tracing::warn!(file = %upload.name, row = n + 1, "Measurement row with null index dropped");
            continue;
        }
        let index = parse_index(&cells[idx])?;
        let intensity = cells
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(i, cell)| match cell {
                CellValue::Int(v) => Ok(*v as f64),
                CellValue::Float(v) => Ok(*v),
                other => Err(ImportError::Parse(format!(
                    "row {}: non-numeric value '{other}' under '{}'",
                    n + 1,
                    raw.headers[i]
                ))),
            })
            .collect::<Result<Vec<f64>, _>>()?;
        rows.push(MeasurementRow {
            index,
            wavelength: wavelength.clone(),
            intensity,
        });
    }

    Ok(MeasurementTable {
        index_column,
        rows,
        dropped_rows,
    })
}

/// A measurement table holding exactly one row.
pub fn read_single_measurement(
    upload: &Upload,
    format: Option<FileFormat>,
) -> Result<ArrayPayload, ImportError> {
    let mut table = read_measurement_table(upload, format, DEFAULT_INDEX_COLUMN)?;
    if table.len() != 1 {
        return Err(ImportError::Shape(format!(
            "the file should contain only a single row, not {}",
            table.len()
        )));
    }
    let row = table.rows.remove(0);
    Ok(ArrayPayload {
        patient_id: row.index,
        wavelength: row.wavelength,
        intensity: row.intensity,
    })
}

/// A single measurement from either a canonical JSONL blob or a one-row table.
pub fn read_array_data(upload: &Upload, format: Option<FileFormat>) -> Result<ArrayPayload, ImportError> {
    match FileFormat::resolve(format, &upload.name)? {
        FileFormat::Jsonl => decode(&upload.bytes),
        other => read_single_measurement(upload, Some(other)),
    }
}
