use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::PreviewMode,
    error::ApiError,
    protocol::{
        upload_fields, HealthResponse, PredictRequest, PredictResponse, UploadResponse,
        HEALTH_PATH, PREDICT_PATH, UPLOAD_PATH,
    },
};
use tracing::{debug, info, warn};

pub mod error;
pub mod session;
pub mod types;
pub mod view;

pub use error::{ClientError, ClientResult};
pub use session::{Notice, NoticeLevel, PreviewSession, SessionEvent, SessionState};
pub use types::UploadedFile;
pub use view::{CellDisplay, IdentifierChoice, PredictionRowView, PreviewView};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// Operations the orchestrator needs from the prediction service.
#[async_trait]
pub trait PredictionBackend: Send + Sync {
    /// Uploads raw file bytes and returns the preview plus the server-assigned filename.
    async fn upload_file(
        &self,
        file: &UploadedFile,
        mode: PreviewMode,
    ) -> ClientResult<UploadResponse>;
    /// Re-requests the preview of an already uploaded file.
    async fn refresh_preview(
        &self,
        filename: &str,
        mode: PreviewMode,
    ) -> ClientResult<UploadResponse>;
    async fn predict(&self, filename: &str) -> ClientResult<PredictResponse>;
    async fn health(&self) -> ClientResult<HealthResponse>;
}

/// HTTP implementation of [`PredictionBackend`].
#[derive(Debug, Clone)]
pub struct PredictionClient {
    http: Client,
    base_url: String,
}

impl PredictionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(Client::new(), base_url)
    }

    pub fn with_http_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_upload_form(&self, form: Form) -> ClientResult<UploadResponse> {
        let response = self
            .http
            .post(self.endpoint(UPLOAD_PATH))
            .multipart(form)
            .send()
            .await?;
        read_json(UPLOAD_PATH, response).await
    }
}

#[async_trait]
impl PredictionBackend for PredictionClient {
    async fn upload_file(
        &self,
        file: &UploadedFile,
        mode: PreviewMode,
    ) -> ClientResult<UploadResponse> {
        let mut part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        if let Some(mime_type) = &file.mime_type {
            part = part.mime_str(mime_type)?;
        }
        let form = Form::new()
            .part(upload_fields::FILE, part)
            .text(upload_fields::PREVIEW_TYPE, mode.as_str());

        info!(
            file = %file.name,
            size_bytes = file.bytes.len(),
            preview_mode = %mode,
            "upload: sending file"
        );
        let response = self.post_upload_form(form).await?;
        info!(filename = %response.filename, "upload: file accepted");
        Ok(response)
    }

    async fn refresh_preview(
        &self,
        filename: &str,
        mode: PreviewMode,
    ) -> ClientResult<UploadResponse> {
        let form = Form::new()
            .text(upload_fields::FILENAME, filename.to_string())
            .text(upload_fields::PREVIEW_TYPE, mode.as_str());

        debug!(filename, preview_mode = %mode, "upload: refreshing preview");
        self.post_upload_form(form).await
    }

    async fn predict(&self, filename: &str) -> ClientResult<PredictResponse> {
        let response = self
            .http
            .post(self.endpoint(PREDICT_PATH))
            .json(&PredictRequest {
                filename: filename.to_string(),
            })
            .send()
            .await?;
        let body: PredictResponse = read_json(PREDICT_PATH, response).await?;
        info!(
            filename,
            predictions = body.predictions.len(),
            "predict: predictions received"
        );
        Ok(body)
    }

    async fn health(&self) -> ClientResult<HealthResponse> {
        let response = self.http.get(self.endpoint(HEALTH_PATH)).send().await?;
        read_json(HEALTH_PATH, response).await
    }
}

/// Maps non-success statuses to [`ClientError::Backend`], carrying the body's `error` field when present.
async fn read_json<T: DeserializeOwned>(path: &str, response: Response) -> ClientResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = ApiError::from_body(&body).map(|err| err.error);
        warn!(
            path,
            status = status.as_u16(),
            message = message.as_deref().unwrap_or_default(),
            "backend request failed"
        );
        return Err(ClientError::Backend {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| ClientError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
