use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Number of rows shown by either preview window.
pub const PREVIEW_WINDOW: usize = 5;

/// Column used for the identifier filter unless configured otherwise.
pub const DEFAULT_IDENTIFIER_COLUMN: &str = "projectid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewMode {
    #[default]
    Head,
    Tail,
}

impl PreviewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PreviewMode::Head => "head",
            PreviewMode::Tail => "tail",
        }
    }
}

impl fmt::Display for PreviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreviewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "head" => Ok(PreviewMode::Head),
            "tail" => Ok(PreviewMode::Tail),
            other => Err(format!("unknown preview mode `{other}` (expected head or tail)")),
        }
    }
}

/// A single scalar cell as received from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    /// Arrays and objects are not expected in tabular data but are kept verbatim.
    Nested(Value),
}

impl CellValue {
    /// Null and empty text count as missing; absent cells are handled by [`PreviewRow::get`].
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(text) => text.is_empty(),
            _ => false,
        }
    }
}

impl From<Value> for CellValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => CellValue::Null,
            Value::Bool(b) => CellValue::Bool(b),
            Value::Number(n) => CellValue::Number(n),
            Value::String(s) => CellValue::Text(s),
            nested @ (Value::Array(_) | Value::Object(_)) => CellValue::Nested(nested),
        }
    }
}

impl From<CellValue> for Value {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Null => Value::Null,
            CellValue::Bool(b) => Value::Bool(b),
            CellValue::Number(n) => Value::Number(n),
            CellValue::Text(s) => Value::String(s),
            CellValue::Nested(v) => v,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str("null"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Nested(v) => write!(f, "{v}"),
        }
    }
}

/// Ordered column -> cell mapping for one preview row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreviewRow {
    cells: Vec<(String, CellValue)>,
}

impl PreviewRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a cell, replacing the value in place when the column already exists.
    pub fn insert(&mut self, column: impl Into<String>, value: CellValue) {
        let column = column.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(column, value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// True when the cell is absent, null or empty text.
    pub fn is_missing(&self, column: &str) -> bool {
        self.get(column).map_or(true, CellValue::is_missing)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for PreviewRow {
    fn from_iter<T: IntoIterator<Item = (K, CellValue)>>(iter: T) -> Self {
        let mut row = PreviewRow::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Preview {
    pub rows: Vec<PreviewRow>,
}

impl Preview {
    pub fn new(rows: Vec<PreviewRow>) -> Self {
        Self { rows }
    }

    /// Column names of the first row in its key order.
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.columns().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Distinct non-missing values of `column`, in first-seen order.
    pub fn distinct_values(&self, column: &str) -> Vec<CellValue> {
        let mut values: Vec<CellValue> = Vec::new();
        for value in self.rows.iter().filter_map(|row| row.get(column)) {
            if !value.is_missing() && !values.contains(value) {
                values.push(value.clone());
            }
        }
        values
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One inference result: either a bare label or an object carrying a probability.
///
/// Any JSON object decodes as [`Prediction::Scored`]. Its label comes from `label`,
/// then `prediction`, and falls back to the object itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Prediction {
    Scored {
        label: CellValue,
        probability: Option<f64>,
    },
    Label(CellValue),
}

impl From<Value> for Prediction {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => {
                let probability = fields.get("probability").and_then(Value::as_f64);
                let label = fields
                    .get("label")
                    .or_else(|| fields.get("prediction"))
                    .cloned();
                let label = label
                    .map(CellValue::from)
                    .unwrap_or_else(|| CellValue::Nested(Value::Object(fields)));
                Prediction::Scored { label, probability }
            }
            other => Prediction::Label(CellValue::from(other)),
        }
    }
}

impl From<Prediction> for Value {
    fn from(prediction: Prediction) -> Self {
        match prediction {
            Prediction::Scored { label, probability } => {
                let mut fields = Map::new();
                fields.insert("label".to_string(), label.into());
                if let Some(probability) = probability {
                    fields.insert("probability".to_string(), Value::from(probability));
                }
                Value::Object(fields)
            }
            Prediction::Label(label) => label.into(),
        }
    }
}

impl Prediction {
    pub fn label(&self) -> &CellValue {
        match self {
            Prediction::Scored { label, .. } => label,
            Prediction::Label(label) => label,
        }
    }

    pub fn probability(&self) -> Option<f64> {
        match self {
            Prediction::Scored { probability, .. } => *probability,
            Prediction::Label(_) => None,
        }
    }
}
