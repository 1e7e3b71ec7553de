//! Upload, preview and prediction orchestration.
//!
//! [`PreviewSession`] owns every piece of client state. Network continuations are
//! serialized through `&mut self`, so at most one upload-or-preview request and one
//! prediction request can be outstanding for a session. Changing the preview mode
//! enqueues exactly one preview refresh; it never re-runs prediction.

use std::ops::{Deref, DerefMut};

use shared::{
    domain::{CellValue, Prediction, Preview, PreviewMode, DEFAULT_IDENTIFIER_COLUMN},
    protocol::HealthResponse,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, ClientResult},
    types::UploadedFile,
    PredictionBackend,
};

pub const UPLOAD_SUCCESS_MESSAGE: &str = "File processed successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoadingChanged(bool),
    PreviewUpdated,
    PredictionsUpdated,
    FilterChanged,
    Notice(Notice),
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub preview_mode: PreviewMode,
    pub uploaded_file: Option<UploadedFile>,
    /// Name assigned by the backend on upload; present once any upload succeeded.
    pub server_filename: Option<String>,
    pub preview: Option<Preview>,
    pub predictions: Option<Vec<Prediction>>,
    pub loading: bool,
    pub(crate) identifier_column: String,
    pub(crate) identifier_options: Vec<CellValue>,
    pub(crate) identifier_filter: Option<CellValue>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTIFIER_COLUMN)
    }
}

impl SessionState {
    pub fn new(identifier_column: impl Into<String>) -> Self {
        Self {
            preview_mode: PreviewMode::default(),
            uploaded_file: None,
            server_filename: None,
            preview: None,
            predictions: None,
            loading: false,
            identifier_column: identifier_column.into(),
            identifier_options: Vec::new(),
            identifier_filter: None,
        }
    }

    pub fn identifier_column(&self) -> &str {
        &self.identifier_column
    }

    /// Distinct identifier values observed in the current preview.
    pub fn identifier_options(&self) -> &[CellValue] {
        &self.identifier_options
    }

    /// Active filter as `(column, value)`, or `None` when showing all rows.
    pub fn identifier_filter(&self) -> Option<(&str, &CellValue)> {
        self.identifier_filter
            .as_ref()
            .map(|value| (self.identifier_column.as_str(), value))
    }

    /// Looks up an identifier option by its displayed text.
    pub fn identifier_option_by_label(&self, label: &str) -> Option<&CellValue> {
        self.identifier_options
            .iter()
            .find(|value| value.to_string() == label)
    }

    /// Replaces the preview wholesale and recomputes the identifier candidates.
    pub(crate) fn replace_preview(&mut self, preview: Option<Preview>) {
        self.identifier_options = preview
            .as_ref()
            .map(|preview| preview.distinct_values(&self.identifier_column))
            .unwrap_or_default();
        self.preview = preview;
    }
}

pub struct PreviewSession<B: PredictionBackend> {
    backend: B,
    state: SessionState,
    events: broadcast::Sender<SessionEvent>,
}

impl<B: PredictionBackend> PreviewSession<B> {
    pub fn new(backend: B) -> Self {
        Self::with_state(backend, SessionState::default())
    }

    pub fn with_state(backend: B, state: SessionState) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            backend,
            state,
            events,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Uploads `file`, refreshes the preview and then requests predictions.
    ///
    /// An upload failure leaves preview and predictions untouched. A prediction
    /// failure after a successful upload keeps the new preview and the previous
    /// predictions.
    pub async fn submit_file(&mut self, file: UploadedFile) -> ClientResult<()> {
        if let Err(err) = file.validate() {
            self.notify_failure(&err);
            return Err(err);
        }

        self.state.uploaded_file = Some(file.clone());
        let mut loading = LoadingGuard::start(self);
        let result = loading.upload_and_predict(&file).await;
        drop(loading);

        match &result {
            Ok(()) => self.emit(SessionEvent::Notice(Notice::success(UPLOAD_SUCCESS_MESSAGE))),
            Err(err) => self.notify_failure(err),
        }
        result
    }

    async fn upload_and_predict(&mut self, file: &UploadedFile) -> ClientResult<()> {
        let uploaded = self
            .backend
            .upload_file(file, self.state.preview_mode)
            .await?;

        self.state.server_filename = Some(uploaded.filename.clone());
        self.state.replace_preview(uploaded.preview());
        self.state.identifier_filter = None;
        info!(
            filename = %uploaded.filename,
            rows = self.state.preview.as_ref().map_or(0, Preview::len),
            identifier_values = self.state.identifier_options.len(),
            "session: preview replaced after upload"
        );
        self.emit(SessionEvent::PreviewUpdated);

        let predicted = self.backend.predict(&uploaded.filename).await?;
        self.state.predictions = Some(predicted.predictions);
        self.emit(SessionEvent::PredictionsUpdated);
        Ok(())
    }

    /// Switches between head and tail windows, refreshing the preview of an uploaded file.
    pub async fn set_preview_mode(&mut self, mode: PreviewMode) -> ClientResult<()> {
        if mode == self.state.preview_mode {
            return Ok(());
        }
        self.state.preview_mode = mode;

        let Some(filename) = self.state.server_filename.clone() else {
            debug!(preview_mode = %mode, "session: mode changed before any upload");
            return Ok(());
        };
        self.refresh_preview(&filename, mode).await
    }

    async fn refresh_preview(&mut self, filename: &str, mode: PreviewMode) -> ClientResult<()> {
        let loading = LoadingGuard::start(self);
        let result = loading.backend.refresh_preview(filename, mode).await;
        drop(loading);

        match result {
            Ok(refreshed) => {
                self.state.replace_preview(refreshed.preview());
                info!(
                    filename,
                    preview_mode = %mode,
                    rows = self.state.preview.as_ref().map_or(0, Preview::len),
                    "session: preview refreshed"
                );
                self.emit(SessionEvent::PreviewUpdated);
                Ok(())
            }
            Err(err) => {
                self.notify_failure(&err);
                Err(err)
            }
        }
    }

    /// Local only; filtering is applied when the view is derived.
    pub fn set_identifier_filter(&mut self, value: Option<CellValue>) {
        self.state.identifier_filter = value.filter(|value| !value.is_missing());
        self.emit(SessionEvent::FilterChanged);
    }

    pub async fn check_health(&mut self) -> ClientResult<HealthResponse> {
        let loading = LoadingGuard::start(self);
        let result = loading.backend.health().await;
        drop(loading);
        if let Err(err) = &result {
            self.notify_failure(err);
        }
        result
    }

    fn set_loading(&mut self, loading: bool) {
        if self.state.loading != loading {
            self.state.loading = loading;
            self.emit(SessionEvent::LoadingChanged(loading));
        }
    }

    fn notify_failure(&self, err: &ClientError) {
        warn!(error = %err, "session: request failed");
        self.emit(SessionEvent::Notice(Notice::error(err.user_message())));
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// Holds the loading flag for one request and clears it on drop, including when
/// the request future is cancelled.
struct LoadingGuard<'a, B: PredictionBackend> {
    session: &'a mut PreviewSession<B>,
}

impl<'a, B: PredictionBackend> LoadingGuard<'a, B> {
    fn start(session: &'a mut PreviewSession<B>) -> Self {
        session.set_loading(true);
        Self { session }
    }
}

impl<B: PredictionBackend> Deref for LoadingGuard<'_, B> {
    type Target = PreviewSession<B>;

    fn deref(&self) -> &Self::Target {
        self.session
    }
}

impl<B: PredictionBackend> DerefMut for LoadingGuard<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
    }
}

impl<B: PredictionBackend> Drop for LoadingGuard<'_, B> {
    fn drop(&mut self) {
        self.session.set_loading(false);
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
