use std::{collections::HashMap, fs};

use anyhow::{anyhow, Context};
use client_core::DEFAULT_API_BASE_URL;
use shared::domain::{PreviewMode, DEFAULT_IDENTIFIER_COLUMN};
use url::Url;

pub const SETTINGS_FILE: &str = "predict_desk.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub identifier_column: String,
    pub preview_mode: PreviewMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            identifier_column: DEFAULT_IDENTIFIER_COLUMN.into(),
            preview_mode: PreviewMode::Head,
        }
    }
}

/// Defaults, then `predict_desk.toml`, then the environment.
pub fn load_settings() -> Settings {
    let raw = fs::read_to_string(SETTINGS_FILE).ok();
    settings_from_sources(raw.as_deref(), |key| std::env::var(key).ok())
}

pub fn settings_from_sources(
    raw_file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = raw_file {
        match toml::from_str::<HashMap<String, String>>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("api_base_url") {
                    settings.api_base_url = v.clone();
                }
                if let Some(v) = file_cfg.get("identifier_column") {
                    settings.identifier_column = v.clone();
                }
                if let Some(mode) = file_cfg.get("preview_mode").and_then(|v| v.parse().ok()) {
                    settings.preview_mode = mode;
                }
            }
            Err(err) => {
                tracing::warn!(file = SETTINGS_FILE, error = %err, "ignoring unreadable settings file")
            }
        }
    }

    if let Some(v) = env("PREDICT_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    settings
}

/// Trims whitespace and trailing slashes and checks the result is an http(s) URL.
pub fn normalize_api_base_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(DEFAULT_API_BASE_URL.to_string());
    }

    let parsed = Url::parse(trimmed).with_context(|| format!("invalid API base URL `{trimmed}`"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(anyhow!("unsupported API URL scheme `{other}`")),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
