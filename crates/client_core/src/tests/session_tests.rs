use super::*;
use async_trait::async_trait;
use serde_json::{json, Value};
use shared::protocol::{PredictResponse, UploadResponse};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::view::{prediction_rows, PreviewView};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Upload { name: String, mode: PreviewMode },
    Refresh { filename: String, mode: PreviewMode },
    Predict { filename: String },
    Health,
}

#[derive(Clone, Default)]
struct FakeBackend {
    calls: Arc<Mutex<Vec<Call>>>,
    preview: Arc<Mutex<Value>>,
    predictions: Arc<Mutex<Value>>,
    fail_upload: Option<String>,
    fail_refresh: Option<String>,
    fail_predict: Option<String>,
    /// Holds upload, refresh and health responses back for this long.
    delay: Option<Duration>,
}

impl FakeBackend {
    fn with_preview(preview: Value) -> Self {
        let backend = Self::default();
        *backend.preview.lock().expect("lock") = preview;
        *backend.predictions.lock().expect("lock") = json!(["yes", "no"]);
        backend
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("lock").push(call);
    }

    async fn respond_later(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn backend_error(message: &str) -> ClientError {
        ClientError::Backend {
            status: 500,
            message: Some(message.to_string()),
        }
    }

    fn upload_response(&self, filename: &str) -> UploadResponse {
        UploadResponse {
            filename: filename.to_string(),
            data_preview: self.preview.lock().expect("lock").clone(),
            message: None,
        }
    }
}

#[async_trait]
impl PredictionBackend for FakeBackend {
    async fn upload_file(
        &self,
        file: &UploadedFile,
        mode: PreviewMode,
    ) -> ClientResult<UploadResponse> {
        self.record(Call::Upload {
            name: file.name.clone(),
            mode,
        });
        self.respond_later().await;
        if let Some(message) = &self.fail_upload {
            return Err(Self::backend_error(message));
        }
        Ok(self.upload_response(&file.name))
    }

    async fn refresh_preview(
        &self,
        filename: &str,
        mode: PreviewMode,
    ) -> ClientResult<UploadResponse> {
        self.record(Call::Refresh {
            filename: filename.to_string(),
            mode,
        });
        self.respond_later().await;
        if let Some(message) = &self.fail_refresh {
            return Err(Self::backend_error(message));
        }
        Ok(self.upload_response(filename))
    }

    async fn predict(&self, filename: &str) -> ClientResult<PredictResponse> {
        self.record(Call::Predict {
            filename: filename.to_string(),
        });
        if let Some(message) = &self.fail_predict {
            return Err(Self::backend_error(message));
        }
        let predictions = self.predictions.lock().expect("lock").clone();
        Ok(PredictResponse {
            predictions: serde_json::from_value(predictions).expect("predictions"),
            message: None,
        })
    }

    async fn health(&self) -> ClientResult<HealthResponse> {
        self.record(Call::Health);
        self.respond_later().await;
        Ok(HealthResponse {
            status: "healthy".to_string(),
        })
    }
}

fn project_preview() -> Value {
    json!([
        {"projectid": "p1", "amount": 10},
        {"projectid": "p1", "amount": ""},
        {"projectid": "p2", "amount": 30}
    ])
}

fn csv(name: &str) -> UploadedFile {
    UploadedFile::new(name, b"projectid,amount\n".to_vec())
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn submit_uploads_then_predicts_and_derives_identifier_options() {
    let backend = FakeBackend::with_preview(project_preview());
    let mut session = PreviewSession::new(backend.clone());

    session.submit_file(csv("data.csv")).await.expect("submit");

    assert_eq!(
        backend.calls(),
        vec![
            Call::Upload {
                name: "data.csv".to_string(),
                mode: PreviewMode::Head
            },
            Call::Predict {
                filename: "data.csv".to_string()
            },
        ]
    );
    let state = session.state();
    assert_eq!(state.server_filename.as_deref(), Some("data.csv"));
    assert_eq!(state.preview.as_ref().map(Preview::len), Some(3));
    assert_eq!(
        state.identifier_options(),
        &[CellValue::from("p1"), CellValue::from("p2")]
    );
    assert_eq!(state.predictions.as_ref().map(Vec::len), Some(2));
    assert!(!state.loading);

    let view = PreviewView::build(state).expect("view");
    let labels: Vec<_> = view
        .identifier_choices
        .iter()
        .map(|choice| choice.label.as_str())
        .collect();
    assert_eq!(labels, vec!["All", "p1", "p2"]);
}

#[tokio::test]
async fn selecting_identifier_restricts_rows_without_network() {
    let backend = FakeBackend::with_preview(project_preview());
    let mut session = PreviewSession::new(backend.clone());
    session.submit_file(csv("data.csv")).await.expect("submit");
    let calls_before = backend.calls().len();

    let p1 = session
        .state()
        .identifier_option_by_label("p1")
        .cloned()
        .expect("p1 option");
    session.set_identifier_filter(Some(p1));

    assert_eq!(backend.calls().len(), calls_before);
    let view = PreviewView::build(session.state()).expect("view");
    assert_eq!(view.rows.len(), 2);
    assert!(view.has_missing);
    assert!(view
        .identifier_choices
        .iter()
        .any(|choice| choice.label == "p1" && choice.selected));
}

#[tokio::test]
async fn upload_failure_keeps_previous_preview_and_predictions() {
    let mut backend = FakeBackend::with_preview(project_preview());
    let mut session = PreviewSession::new(backend.clone());
    session.submit_file(csv("first.csv")).await.expect("submit");
    let preview_before = session.state().preview.clone();
    let predictions_before = session.state().predictions.clone();

    backend.fail_upload = Some("disk full".to_string());
    let mut session = PreviewSession::with_state(backend.clone(), session.state().clone());
    let mut rx = session.subscribe();

    let err = session
        .submit_file(csv("second.csv"))
        .await
        .expect_err("upload fails");
    assert_eq!(err.user_message(), "disk full");

    let state = session.state();
    assert_eq!(state.preview, preview_before);
    assert_eq!(state.predictions, predictions_before);
    assert_eq!(state.server_filename.as_deref(), Some("first.csv"));
    assert!(!state.loading);

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            SessionEvent::LoadingChanged(true),
            SessionEvent::LoadingChanged(false),
            SessionEvent::Notice(Notice::error("disk full")),
        ]
    );
}

#[tokio::test]
async fn prediction_failure_after_upload_updates_preview_but_keeps_predictions() {
    let mut backend = FakeBackend::with_preview(project_preview());
    backend.fail_predict = Some("model unavailable".to_string());
    let mut session = PreviewSession::new(backend.clone());
    let mut rx = session.subscribe();

    let err = session
        .submit_file(csv("data.csv"))
        .await
        .expect_err("predict fails");
    assert_eq!(err.user_message(), "model unavailable");

    let state = session.state();
    assert!(state.preview.is_some());
    assert!(state.predictions.is_none());
    assert!(!state.loading);

    let events = drain(&mut rx);
    assert!(events.contains(&SessionEvent::PreviewUpdated));
    assert!(!events.contains(&SessionEvent::PredictionsUpdated));
    assert_eq!(
        events.last(),
        Some(&SessionEvent::Notice(Notice::error("model unavailable")))
    );
}

#[tokio::test]
async fn prediction_failure_on_later_upload_keeps_earlier_predictions() {
    let mut backend = FakeBackend::with_preview(project_preview());
    let mut session = PreviewSession::new(backend.clone());
    session.submit_file(csv("first.csv")).await.expect("submit");
    let predictions_before = session.state().predictions.clone();
    assert!(predictions_before.is_some());

    *backend.preview.lock().expect("lock") = json!([{"projectid": "p9", "amount": 90}]);
    backend.fail_predict = Some("model unavailable".to_string());
    let mut session = PreviewSession::with_state(backend.clone(), session.state().clone());
    let mut rx = session.subscribe();

    let err = session
        .submit_file(csv("second.csv"))
        .await
        .expect_err("predict fails");
    assert_eq!(err.user_message(), "model unavailable");

    let state = session.state();
    assert_eq!(state.server_filename.as_deref(), Some("second.csv"));
    assert_eq!(state.preview.as_ref().map(Preview::len), Some(1));
    assert_eq!(state.identifier_options(), &[CellValue::from("p9")]);
    assert_eq!(state.predictions, predictions_before);
    assert!(!state.loading);

    let events = drain(&mut rx);
    assert!(events.contains(&SessionEvent::PreviewUpdated));
    assert!(!events.contains(&SessionEvent::PredictionsUpdated));
    assert_eq!(
        events.last(),
        Some(&SessionEvent::Notice(Notice::error("model unavailable")))
    );
}

#[tokio::test]
async fn cancelled_submit_clears_loading_flag() {
    let backend = FakeBackend {
        delay: Some(Duration::from_secs(5)),
        ..FakeBackend::with_preview(project_preview())
    };
    let mut session = PreviewSession::new(backend.clone());
    let mut rx = session.subscribe();

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        session.submit_file(csv("slow.csv")),
    )
    .await;
    assert!(outcome.is_err(), "submit should still be waiting on upload");

    let state = session.state();
    assert!(!state.loading);
    assert!(state.preview.is_none());
    assert!(state.server_filename.is_none());
    assert_eq!(
        drain(&mut rx),
        vec![
            SessionEvent::LoadingChanged(true),
            SessionEvent::LoadingChanged(false),
        ]
    );
}

#[tokio::test]
async fn cancelled_mode_refresh_clears_loading_flag() {
    let mut backend = FakeBackend::with_preview(project_preview());
    let mut session = PreviewSession::new(backend.clone());
    session.submit_file(csv("data.csv")).await.expect("submit");
    let preview_before = session.state().preview.clone();

    backend.delay = Some(Duration::from_secs(5));
    let mut session = PreviewSession::with_state(backend.clone(), session.state().clone());
    let mut rx = session.subscribe();

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        session.set_preview_mode(PreviewMode::Tail),
    )
    .await;
    assert!(outcome.is_err(), "refresh should still be pending");

    let state = session.state();
    assert!(!state.loading);
    assert_eq!(state.preview_mode, PreviewMode::Tail);
    assert_eq!(state.preview, preview_before);
    assert_eq!(
        drain(&mut rx),
        vec![
            SessionEvent::LoadingChanged(true),
            SessionEvent::LoadingChanged(false),
        ]
    );
}

#[tokio::test]
async fn new_upload_resets_identifier_filter() {
    let backend = FakeBackend::with_preview(project_preview());
    let mut session = PreviewSession::new(backend.clone());
    session.submit_file(csv("data.csv")).await.expect("submit");
    session.set_identifier_filter(Some(CellValue::from("p2")));
    assert!(session.state().identifier_filter().is_some());

    session.submit_file(csv("other.csv")).await.expect("submit");
    assert!(session.state().identifier_filter().is_none());
}

#[tokio::test]
async fn mode_change_refreshes_preview_only_and_keeps_filter() {
    let backend = FakeBackend::with_preview(project_preview());
    let mut session = PreviewSession::new(backend.clone());
    session.submit_file(csv("data.csv")).await.expect("submit");
    session.set_identifier_filter(Some(CellValue::from("p1")));

    *backend.preview.lock().expect("lock") = json!([{"projectid": "p3", "amount": 1}]);
    session
        .set_preview_mode(PreviewMode::Tail)
        .await
        .expect("refresh");

    let calls = backend.calls();
    assert_eq!(
        calls.last(),
        Some(&Call::Refresh {
            filename: "data.csv".to_string(),
            mode: PreviewMode::Tail
        })
    );
    assert_eq!(
        calls
            .iter()
            .filter(|call| matches!(call, Call::Predict { .. }))
            .count(),
        1
    );
    let state = session.state();
    assert_eq!(state.preview_mode, PreviewMode::Tail);
    assert_eq!(state.identifier_options(), &[CellValue::from("p3")]);
    assert_eq!(
        state.identifier_filter(),
        Some(("projectid", &CellValue::from("p1")))
    );
}

#[tokio::test]
async fn mode_change_before_upload_makes_no_network_call() {
    let backend = FakeBackend::default();
    let mut session = PreviewSession::new(backend.clone());
    let mut rx = session.subscribe();

    session
        .set_preview_mode(PreviewMode::Tail)
        .await
        .expect("no-op");

    assert!(backend.calls().is_empty());
    assert!(drain(&mut rx).is_empty());
    let state = session.state();
    assert!(state.preview.is_none());
    assert!(state.predictions.is_none());
    assert!(!state.loading);
}

#[tokio::test]
async fn selecting_current_mode_does_not_refresh() {
    let backend = FakeBackend::with_preview(project_preview());
    let mut session = PreviewSession::new(backend.clone());
    session.submit_file(csv("data.csv")).await.expect("submit");
    let calls_before = backend.calls().len();

    session
        .set_preview_mode(PreviewMode::Head)
        .await
        .expect("same mode");
    assert_eq!(backend.calls().len(), calls_before);
}

#[tokio::test]
async fn refresh_failure_leaves_preview_intact() {
    let mut backend = FakeBackend::with_preview(project_preview());
    let mut session = PreviewSession::new(backend.clone());
    session.submit_file(csv("data.csv")).await.expect("submit");
    let preview_before = session.state().preview.clone();

    backend.fail_refresh = Some("No file uploaded or cached".to_string());
    let mut session = PreviewSession::with_state(backend, session.state().clone());
    let err = session
        .set_preview_mode(PreviewMode::Tail)
        .await
        .expect_err("refresh fails");

    assert_eq!(err.user_message(), "No file uploaded or cached");
    assert_eq!(session.state().preview, preview_before);
    assert!(!session.state().loading);
}

#[tokio::test]
async fn invalid_file_is_rejected_before_any_request() {
    let backend = FakeBackend::with_preview(project_preview());
    let mut session = PreviewSession::new(backend.clone());
    let mut rx = session.subscribe();

    let err = session
        .submit_file(UploadedFile::new("notes.txt", Vec::new()))
        .await
        .expect_err("invalid");
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(backend.calls().is_empty());
    assert_eq!(
        drain(&mut rx),
        vec![SessionEvent::Notice(Notice::error("Invalid file type"))]
    );
    assert!(session.state().uploaded_file.is_none());
}

#[tokio::test]
async fn preview_without_identifier_column_has_no_choices() {
    let backend = FakeBackend::with_preview(json!({"amount": {"0": 1, "1": 2}}));
    let mut session = PreviewSession::new(backend);
    session.submit_file(csv("data.csv")).await.expect("submit");

    assert!(session.state().identifier_options().is_empty());
    let view = PreviewView::build(session.state()).expect("view");
    assert!(view.identifier_choices.is_empty());
    assert_eq!(view.rows.len(), 2);
}

#[tokio::test]
async fn malformed_preview_is_treated_as_no_preview() {
    let backend = FakeBackend::with_preview(json!("not a table"));
    let mut session = PreviewSession::new(backend);
    session.submit_file(csv("data.csv")).await.expect("submit");

    assert!(session.state().preview.is_none());
    assert!(PreviewView::build(session.state()).is_none());
    assert_eq!(session.state().predictions.as_ref().map(Vec::len), Some(2));
}

#[tokio::test]
async fn successful_submit_emits_success_notice() {
    let backend = FakeBackend::with_preview(project_preview());
    *backend.predictions.lock().expect("lock") =
        json!([{"label": "yes", "probability": 0.8765}, "no"]);
    let mut session = PreviewSession::new(backend);
    let mut rx = session.subscribe();

    session.submit_file(csv("data.csv")).await.expect("submit");

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            SessionEvent::LoadingChanged(true),
            SessionEvent::PreviewUpdated,
            SessionEvent::PredictionsUpdated,
            SessionEvent::LoadingChanged(false),
            SessionEvent::Notice(Notice::success(UPLOAD_SUCCESS_MESSAGE)),
        ]
    );
    let rows = prediction_rows(session.state().predictions.as_deref().unwrap_or_default());
    assert_eq!(rows[0].confidence, "87.65%");
    assert_eq!(rows[1].confidence, "N/A");
}

#[tokio::test]
async fn health_check_goes_through_backend() {
    let backend = FakeBackend::default();
    let mut session = PreviewSession::new(backend.clone());

    let health = session.check_health().await.expect("health");
    assert_eq!(health.status, "healthy");
    assert_eq!(backend.calls(), vec![Call::Health]);
}
