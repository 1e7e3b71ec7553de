use super::*;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = settings_from_sources(None, no_env);
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.api_base_url, "http://localhost:5000/api");
    assert_eq!(settings.identifier_column, "projectid");
    assert_eq!(settings.preview_mode, PreviewMode::Head);
}

#[test]
fn file_values_override_defaults() {
    let raw = r#"
api_base_url = "http://predict.internal:8080/api"
identifier_column = "site_id"
preview_mode = "tail"
"#;
    let settings = settings_from_sources(Some(raw), no_env);
    assert_eq!(settings.api_base_url, "http://predict.internal:8080/api");
    assert_eq!(settings.identifier_column, "site_id");
    assert_eq!(settings.preview_mode, PreviewMode::Tail);
}

#[test]
fn unknown_preview_mode_in_file_keeps_default() {
    let settings = settings_from_sources(Some(r#"preview_mode = "sideways""#), no_env);
    assert_eq!(settings.preview_mode, PreviewMode::Head);
}

#[test]
fn unreadable_file_is_ignored() {
    let settings = settings_from_sources(Some("this is = = not toml"), no_env);
    assert_eq!(settings, Settings::default());
}

#[test]
fn environment_overrides_file_and_app_prefix_wins() {
    let raw = r#"api_base_url = "http://from-file/api""#;

    let settings = settings_from_sources(Some(raw), |key| {
        (key == "PREDICT_API_URL").then(|| "http://from-env/api".to_string())
    });
    assert_eq!(settings.api_base_url, "http://from-env/api");

    let settings = settings_from_sources(Some(raw), |key| match key {
        "PREDICT_API_URL" => Some("http://from-env/api".to_string()),
        "APP__API_BASE_URL" => Some("http://from-app/api".to_string()),
        _ => None,
    });
    assert_eq!(settings.api_base_url, "http://from-app/api");
}

#[test]
fn normalizes_api_base_url() {
    assert_eq!(
        normalize_api_base_url(" http://localhost:5000/api/ ").expect("valid"),
        "http://localhost:5000/api"
    );
    assert_eq!(
        normalize_api_base_url("").expect("empty falls back"),
        DEFAULT_API_BASE_URL
    );
    assert!(normalize_api_base_url("not a url").is_err());
    assert!(normalize_api_base_url("ftp://example.com/api").is_err());
}
