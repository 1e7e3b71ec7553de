use std::path::Path;

use crate::error::{ClientError, ClientResult};

/// Extensions the prediction backend is able to parse.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls"];

/// Raw tabular file selected by the user, held until another file replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first()
            .map(|mime| mime.essence_str().to_string());
        Self {
            name,
            bytes,
            mime_type,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, bytes))
    }

    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() && ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Rejects files the backend would refuse, before any bytes leave the client.
    pub fn validate(&self) -> ClientResult<()> {
        if self.name.trim().is_empty() {
            return Err(ClientError::Validation("No selected file".to_string()));
        }
        match self.extension() {
            Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
            _ => Err(ClientError::Validation("Invalid file type".to_string())),
        }
    }
}
