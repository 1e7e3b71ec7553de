//! Line-driven session: each input line maps to one orchestrator operation.

use anyhow::Result;
use client_core::{PredictionBackend, PreviewSession, SessionEvent, UploadedFile};
use shared::domain::PreviewMode;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::broadcast,
};

use crate::render::{render_notice, render_state};

pub const HELP: &str = "\
commands:
  open <path>      upload a file and request predictions
  head | tail      switch the preview window
  filter <value>   show only rows with this project id
  filter           clear the project id filter
  show             redraw the preview and results
  health           check the backend
  help             show this text
  quit             leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    Open(String),
    Mode(PreviewMode),
    Filter(Option<String>),
    Show,
    Health,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Option<InputCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "open" | "upload" if !rest.is_empty() => InputCommand::Open(rest.to_string()),
        "open" | "upload" => return Err("usage: open <path>".to_string()),
        "head" | "tail" => InputCommand::Mode(verb.parse()?),
        "mode" => InputCommand::Mode(rest.parse()?),
        "filter" if rest.is_empty() || rest.eq_ignore_ascii_case("all") => {
            InputCommand::Filter(None)
        }
        "filter" => InputCommand::Filter(Some(rest.to_string())),
        "show" => InputCommand::Show,
        "health" => InputCommand::Health,
        "help" | "?" => InputCommand::Help,
        "quit" | "exit" => InputCommand::Quit,
        other => return Err(format!("unknown command `{other}` (try `help`)")),
    };
    Ok(Some(command))
}

/// Applies one command; returns `false` when the session should end.
pub async fn apply_command<B: PredictionBackend>(
    session: &mut PreviewSession<B>,
    command: InputCommand,
    out: &mut Vec<String>,
) -> bool {
    match command {
        InputCommand::Open(path) => match UploadedFile::from_path(&path).await {
            Ok(file) => {
                // Failures are reported through session notices.
                let _ = session.submit_file(file).await;
                out.push(render_state(session.state()));
            }
            Err(err) => out.push(format!("error: {err}")),
        },
        InputCommand::Mode(mode) => {
            if session.set_preview_mode(mode).await.is_ok() {
                out.push(render_state(session.state()));
            }
        }
        InputCommand::Filter(None) => {
            session.set_identifier_filter(None);
            out.push(render_state(session.state()));
        }
        InputCommand::Filter(Some(label)) => {
            match session.state().identifier_option_by_label(&label).cloned() {
                Some(value) => {
                    session.set_identifier_filter(Some(value));
                    out.push(render_state(session.state()));
                }
                None => out.push(format!("no project id `{label}` in the current preview")),
            }
        }
        InputCommand::Show => out.push(render_state(session.state())),
        InputCommand::Health => {
            if let Ok(health) = session.check_health().await {
                out.push(format!("backend status: {}", health.status));
            }
        }
        InputCommand::Help => out.push(HELP.to_string()),
        InputCommand::Quit => return false,
    }
    true
}

pub fn drain_notices(rx: &mut broadcast::Receiver<SessionEvent>, out: &mut Vec<String>) {
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::Notice(notice) = event {
            out.push(render_notice(&notice));
        }
    }
}

pub async fn run<B, R>(session: &mut PreviewSession<B>, input: R) -> Result<()>
where
    B: PredictionBackend,
    R: AsyncBufRead + Unpin,
{
    let mut notices = session.subscribe();
    let mut lines = input.lines();
    println!("{HELP}");

    while let Some(line) = lines.next_line().await? {
        let mut out = Vec::new();
        let keep_going = match parse_command(&line) {
            Ok(Some(command)) => apply_command(session, command, &mut out).await,
            Ok(None) => true,
            Err(message) => {
                out.push(message);
                true
            }
        };
        drain_notices(&mut notices, &mut out);
        for block in out {
            println!("{block}");
        }
        if !keep_going {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/interactive_tests.rs"]
mod tests;
