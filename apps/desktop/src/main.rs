use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{PredictionClient, PreviewSession, SessionState, UploadedFile};
use shared::domain::PreviewMode;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

mod config;
mod interactive;
mod render;

use config::{load_settings, normalize_api_base_url, Settings};

#[derive(Parser, Debug)]
#[command(name = "predict-desk", about = "Preview tabular data and request predictions")]
struct Cli {
    /// Base URL of the prediction API, e.g. http://localhost:5000/api
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Preview window, head or tail; overrides the configured default.
    #[arg(long, global = true)]
    mode: Option<PreviewMode>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the backend is reachable.
    Health,
    /// Upload a file, print its preview and the predictions.
    Predict {
        file: PathBuf,
        /// Only show preview rows with this project id.
        #[arg(long)]
        project_id: Option<String>,
    },
    /// Read commands from stdin against a live session.
    Interactive {
        /// File to upload before reading commands.
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let settings = load_settings();
    let api_url = normalize_api_base_url(cli.api_url.as_deref().unwrap_or(&settings.api_base_url))?;
    tracing::info!(api_url = %api_url, "using prediction API");

    let state = initial_state(&settings, cli.mode);
    let mut session = PreviewSession::with_state(PredictionClient::new(api_url), state);

    match cli.command {
        Command::Health => {
            let health = session
                .check_health()
                .await
                .context("backend health check failed")?;
            println!("backend status: {}", health.status);
        }
        Command::Predict { file, project_id } => {
            let mut notices = session.subscribe();
            let upload = UploadedFile::from_path(&file)
                .await
                .with_context(|| format!("cannot open {}", file.display()))?;
            let result = session.submit_file(upload).await;

            let mut out = Vec::new();
            if let Some(label) = project_id {
                match session.state().identifier_option_by_label(&label).cloned() {
                    Some(value) => session.set_identifier_filter(Some(value)),
                    None => out.push(format!("no project id `{label}` in the preview")),
                }
            }
            out.push(render::render_state(session.state()));
            interactive::drain_notices(&mut notices, &mut out);
            for block in out {
                println!("{block}");
            }
            result.context("prediction request failed")?;
        }
        Command::Interactive { file } => {
            if let Some(file) = file {
                let mut notices = session.subscribe();
                let mut out = Vec::new();
                interactive::apply_command(
                    &mut session,
                    interactive::InputCommand::Open(file.display().to_string()),
                    &mut out,
                )
                .await;
                interactive::drain_notices(&mut notices, &mut out);
                for block in out {
                    println!("{block}");
                }
            }
            interactive::run(&mut session, BufReader::new(tokio::io::stdin())).await?;
        }
    }

    Ok(())
}

/// Session state before any upload; a `--mode` flag wins over the configured mode.
fn initial_state(settings: &Settings, mode: Option<PreviewMode>) -> SessionState {
    let mut state = SessionState::new(settings.identifier_column.clone());
    state.preview_mode = mode.unwrap_or(settings.preview_mode);
    state
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
