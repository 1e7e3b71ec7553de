use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{CellValue, Prediction, Preview, PreviewRow};

pub const UPLOAD_PATH: &str = "/upload";
pub const PREDICT_PATH: &str = "/predict";
pub const HEALTH_PATH: &str = "/health";

/// Multipart field names understood by the upload endpoint.
pub mod upload_fields {
    pub const FILE: &str = "file";
    pub const FILENAME: &str = "filename";
    pub const PREVIEW_TYPE: &str = "preview_type";
}

/// Response of `POST /upload`, for both a fresh file and a cached refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    #[serde(default)]
    pub data_preview: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadResponse {
    pub fn preview(&self) -> Option<Preview> {
        normalize_preview(&self.data_preview)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictRequest {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<Prediction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: String,
}

/// Converts either wire shape of `data_preview` into row form.
///
/// Accepted shapes:
/// - a sequence of row objects: `[{"a": 1, "b": 2}, ...]`
/// - a column-keyed mapping of row index to value: `{"a": {"0": 1, "1": 3}, ...}`
///
/// Anything else, including `null`, yields `None`. Non-object entries in a row
/// sequence are dropped.
pub fn normalize_preview(raw: &Value) -> Option<Preview> {
    match raw {
        Value::Array(entries) => Some(rows_from_records(entries)),
        Value::Object(columns) => rows_from_columns(columns),
        _ => None,
    }
}

fn rows_from_records(entries: &[Value]) -> Preview {
    let rows = entries
        .iter()
        .filter_map(Value::as_object)
        .map(|record| {
            record
                .iter()
                .map(|(column, value)| (column.clone(), CellValue::from(value.clone())))
                .collect::<PreviewRow>()
        })
        .collect();
    Preview::new(rows)
}

fn rows_from_columns(columns: &Map<String, Value>) -> Option<Preview> {
    let mut index_order: Vec<&str> = Vec::new();
    for cells in columns.values() {
        let cells = cells.as_object()?;
        for index in cells.keys() {
            if !index_order.contains(&index.as_str()) {
                index_order.push(index);
            }
        }
    }

    let rows = index_order
        .iter()
        .map(|index| {
            let mut row = PreviewRow::new();
            for (column, cells) in columns {
                if let Some(value) = cells.get(*index) {
                    row.insert(column.clone(), CellValue::from(value.clone()));
                }
            }
            row
        })
        .collect();
    Some(Preview::new(rows))
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
