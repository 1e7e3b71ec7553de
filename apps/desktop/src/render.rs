//! Plain-text rendering of the preview and prediction tables.

use client_core::{
    view::{prediction_rows, MISSING_MARKER},
    Notice, NoticeLevel, PreviewView, SessionState,
};
use shared::domain::PreviewMode;

pub const MISSING_WARNING: &str =
    "Warning: Some values are missing in the preview and are shown as N/A.";

pub fn render_preview(view: &PreviewView) -> String {
    let mut out = String::from("Data Preview\n");
    let mode_label = match view.mode {
        PreviewMode::Head => "[Head (first 5)]  Tail (last 5)",
        PreviewMode::Tail => " Head (first 5)  [Tail (last 5)]",
    };
    out.push_str(mode_label);
    out.push('\n');

    if !view.identifier_choices.is_empty() {
        let choices: Vec<String> = view
            .identifier_choices
            .iter()
            .map(|choice| {
                if choice.selected {
                    format!("[{}]", choice.label)
                } else {
                    choice.label.clone()
                }
            })
            .collect();
        out.push_str(&format!("Project ID: {}\n", choices.join(" ")));
    }

    if view.has_missing {
        out.push_str(MISSING_WARNING);
        out.push('\n');
    }

    let rows: Vec<Vec<String>> = view
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.text().to_string()).collect())
        .collect();
    out.push_str(&render_table(&view.columns, &rows));
    out
}

pub fn render_predictions(state: &SessionState) -> Option<String> {
    let predictions = state.predictions.as_ref()?;
    let rows: Vec<Vec<String>> = prediction_rows(predictions)
        .into_iter()
        .map(|row| vec![row.row_number.to_string(), row.label, row.confidence])
        .collect();
    let headers = ["Row", "Prediction", "Confidence"].map(String::from);

    let mut out = String::from("Prediction Results\n");
    out.push_str(&render_table(&headers, &rows));
    Some(out)
}

pub fn render_state(state: &SessionState) -> String {
    let mut sections = Vec::new();
    if state.loading {
        sections.push("Loading...".to_string());
    }
    if let Some(view) = PreviewView::build(state) {
        sections.push(render_preview(&view));
    }
    if let Some(predictions) = render_predictions(state) {
        sections.push(predictions);
    }
    if sections.is_empty() {
        sections.push("No file uploaded yet.".to_string());
    }
    sections.join("\n")
}

pub fn render_notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Success => format!("ok: {}", notice.message),
        NoticeLevel::Error => format!("error: {}", notice.message),
    }
}

/// Left-aligned columns separated by ` | ` with a dashed rule under the header.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    if headers.is_empty() {
        return String::new();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_line = |cells: &[String]| {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or(MISSING_MARKER);
                format!("{cell:<width$}")
            })
            .collect();
        padded.join(" | ").trim_end().to_string()
    };

    let mut out = format_line(headers);
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');
    for row in rows {
        out.push_str(&format_line(row.as_slice()));
        out.push('\n');
    }
    out
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
