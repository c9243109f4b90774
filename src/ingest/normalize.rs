//! JSON record flattening and CSV serialization
//!
//! Turns an array of (possibly nested) JSON objects into a uniform table:
//! nested objects become `parent.child` columns, the column set is the
//! union of keys across all records in first-seen order, and records
//! missing a column get an empty cell.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Separator joining nested object keys into one column name
pub const PATH_SEPARATOR: &str = ".";

/// A normalized table ready for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularArtifact {
    /// Column headers in first-seen order
    pub columns: Vec<String>,
    /// One cell per column for every row, in `columns` order
    pub rows: Vec<Vec<String>>,
    /// CSV encoding of header plus rows
    pub serialized: String,
}

impl TabularArtifact {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// First line of the CSV, for log previews
    pub fn header_line(&self) -> &str {
        self.serialized.lines().next().unwrap_or_default()
    }

    /// Look up a cell by row index and column name
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }
}

/// Parse `json_text` and flatten it into a [`TabularArtifact`].
pub fn normalize(json_text: &str) -> Result<TabularArtifact> {
    let value: Value = serde_json::from_str(json_text).map_err(|e| Error::Parse {
        reason: e.to_string(),
        input: json_text.to_string(),
    })?;

    let records = into_records(value)?;
    let flat: Vec<Map<String, Value>> = records.iter().map(flatten_record).collect();

    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for record in &flat {
        for key in record.keys() {
            if seen.insert(key.clone()) {
                columns.push(key.clone());
            }
        }
    }

    // No columns means an empty CSV, so report no rows either
    if columns.is_empty() {
        return Ok(TabularArtifact {
            columns,
            rows: Vec::new(),
            serialized: String::new(),
        });
    }

    let rows: Vec<Vec<String>> = flat
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| record.get(column).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    let serialized = write_csv(&columns, &rows)?;

    Ok(TabularArtifact {
        columns,
        rows,
        serialized,
    })
}

/// Read a parsed value as a sequence of records.
///
/// Accepts an array of objects, or a single object as a one-record table.
fn into_records(value: Value) -> Result<Vec<Map<String, Value>>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(record) => Ok(record),
                other => Err(Error::Shape(format!(
                    "element {} is {}, expected an object",
                    idx,
                    kind_of(&other)
                ))),
            })
            .collect(),
        Value::Object(record) => Ok(vec![record]),
        other => Err(Error::Shape(format!(
            "top-level value is {}, expected an array of objects",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Flatten nested objects into `parent.child` keys.
///
/// Arrays are leaves. A later key overwrites an earlier one that flattens
/// to the same name (`{"a.b": 1, "a": {"b": 2}}` keeps `2`).
pub fn flatten_record(record: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(&mut out, None, record);
    out
}

fn flatten_into(out: &mut Map<String, Value>, prefix: Option<&str>, record: &Map<String, Value>) {
    for (key, value) in record {
        let path = match prefix {
            Some(p) => format!("{}{}{}", p, PATH_SEPARATOR, key),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) => flatten_into(out, Some(&path), nested),
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// Textual form of a flattened leaf value.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Arrays (and objects, which flattening never leaves) keep their JSON text
        nested => nested.to_string(),
    }
}

fn write_csv(columns: &[String], rows: &[Vec<String>]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(columns).map_err(csv_write_error)?;
    for row in rows {
        writer.write_record(row).map_err(csv_write_error)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;

    // Every field came from a Rust `String`
    String::from_utf8(bytes).map_err(|e| Error::Transcode(e.to_string()))
}

fn csv_write_error(e: csv::Error) -> Error {
    Error::Transcode(format!("failed to encode CSV: {}", e))
}
