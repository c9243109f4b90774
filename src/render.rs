//! Retrieval transcoding
//!
//! Stored artifacts are always CSV. On the way out they are either handed
//! back untouched or re-read into `{"data": [ {...}, ... ]}` records whose
//! keys follow the header and whose values are all strings.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Requested output representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// The stored CSV as-is
    #[default]
    Raw,
    /// Row-structured JSON
    Records,
}

impl OutputFormat {
    /// Permissive parse: `records` and `json` (any case) select
    /// [`OutputFormat::Records`], everything else is [`OutputFormat::Raw`].
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case("records") || s.eq_ignore_ascii_case("json") {
            OutputFormat::Records
        } else {
            OutputFormat::Raw
        }
    }
}

/// JSON body for the records representation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordsBody {
    pub data: Vec<Map<String, Value>>,
}

/// A rendered artifact, tagged with how it should be delivered
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    /// CSV text for download as an attachment
    Csv(String),
    /// JSON records body
    Records(RecordsBody),
}

/// Render a stored CSV payload in the requested format.
pub fn render(payload: String, format: OutputFormat) -> Result<Rendered> {
    match format {
        OutputFormat::Raw => Ok(Rendered::Csv(payload)),
        OutputFormat::Records => Ok(Rendered::Records(csv_to_records(&payload)?)),
    }
}

/// Parse CSV text into header-keyed records.
pub fn csv_to_records(payload: &str) -> Result<RecordsBody> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(payload.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| Error::Transcode(e.to_string()))?
        .clone();

    let mut data = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::Transcode(e.to_string()))?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        data.push(row);
    }

    Ok(RecordsBody { data })
}
