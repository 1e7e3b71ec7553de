//! Display derivations over session state. Nothing here performs I/O.

use shared::domain::{CellValue, Prediction, Preview, PreviewMode, PreviewRow, PREVIEW_WINDOW};

use crate::session::SessionState;

pub const MISSING_MARKER: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellDisplay {
    Value(String),
    Missing,
}

impl CellDisplay {
    pub fn text(&self) -> &str {
        match self {
            CellDisplay::Value(text) => text,
            CellDisplay::Missing => MISSING_MARKER,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellDisplay::Missing)
    }
}

/// Entry in the identifier filter selector; `value: None` is the "All" entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierChoice {
    pub label: String,
    pub value: Option<CellValue>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreviewView {
    pub mode: PreviewMode,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellDisplay>>,
    pub has_missing: bool,
    /// Empty when the preview has no identifier values to choose from.
    pub identifier_choices: Vec<IdentifierChoice>,
}

impl PreviewView {
    pub fn build(state: &SessionState) -> Option<Self> {
        let preview = state.preview.as_ref()?;
        let columns = preview.columns();
        let visible = visible_rows(preview, state.identifier_filter(), state.preview_mode);
        let rows: Vec<Vec<CellDisplay>> = visible
            .iter()
            .map(|row| columns.iter().map(|column| display_cell(row, column)).collect())
            .collect();
        let has_missing = rows.iter().flatten().any(CellDisplay::is_missing);

        Some(Self {
            mode: state.preview_mode,
            columns,
            rows,
            has_missing,
            identifier_choices: identifier_choices(
                state.identifier_options(),
                state.identifier_filter(),
            ),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRowView {
    /// 1-based.
    pub row_number: usize,
    pub label: String,
    pub confidence: String,
}

/// Keeps rows whose `column` equals `filter`; no filter keeps every row.
pub fn filter_rows<'a>(
    rows: &'a [PreviewRow],
    column: &str,
    filter: Option<&CellValue>,
) -> Vec<&'a PreviewRow> {
    match filter {
        Some(wanted) => rows
            .iter()
            .filter(|row| row.get(column) == Some(wanted))
            .collect(),
        None => rows.iter().collect(),
    }
}

/// First or last [`PREVIEW_WINDOW`] rows, or all of them when fewer exist.
pub fn window_rows<T>(rows: &[T], mode: PreviewMode) -> &[T] {
    match mode {
        PreviewMode::Head => &rows[..rows.len().min(PREVIEW_WINDOW)],
        PreviewMode::Tail => &rows[rows.len().saturating_sub(PREVIEW_WINDOW)..],
    }
}

/// Filtering first, then windowing.
pub fn visible_rows<'a>(
    preview: &'a Preview,
    filter: Option<(&str, &CellValue)>,
    mode: PreviewMode,
) -> Vec<&'a PreviewRow> {
    let filtered = match filter {
        Some((column, value)) => filter_rows(&preview.rows, column, Some(value)),
        None => preview.rows.iter().collect(),
    };
    window_rows(&filtered, mode).to_vec()
}

pub fn display_cell(row: &PreviewRow, column: &str) -> CellDisplay {
    match row.get(column) {
        Some(value) if !value.is_missing() => CellDisplay::Value(value.to_string()),
        _ => CellDisplay::Missing,
    }
}

pub fn identifier_choices(
    options: &[CellValue],
    selected: Option<(&str, &CellValue)>,
) -> Vec<IdentifierChoice> {
    if options.is_empty() {
        return Vec::new();
    }
    let selected = selected.map(|(_, value)| value);
    std::iter::once(IdentifierChoice {
        label: "All".to_string(),
        value: None,
        selected: selected.is_none(),
    })
    .chain(options.iter().map(|value| IdentifierChoice {
        label: value.to_string(),
        value: Some(value.clone()),
        selected: selected == Some(value),
    }))
    .collect()
}

pub fn format_confidence(prediction: &Prediction) -> String {
    match prediction.probability() {
        Some(probability) => format!("{:.2}%", probability * 100.0),
        None => MISSING_MARKER.to_string(),
    }
}

pub fn prediction_rows(predictions: &[Prediction]) -> Vec<PredictionRowView> {
    predictions
        .iter()
        .enumerate()
        .map(|(index, prediction)| PredictionRowView {
            row_number: index + 1,
            label: prediction.label().to_string(),
            confidence: format_confidence(prediction),
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
