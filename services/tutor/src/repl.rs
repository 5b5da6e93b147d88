//! The interactive read-eval loop.

use crate::command::{Command, HELP};
use crate::render::mode_menu;
use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::debug;
use tutor_core::{Mode, SessionOrchestrator, TurnOutcome};

/// Line that terminates a multi-line `/edit` block.
const END_OF_BLOCK: &str = ".";

pub struct Repl<R> {
    orchestrator: SessionOrchestrator,
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> Repl<R> {
    pub fn new(orchestrator: SessionOrchestrator, input: R) -> Self {
        Self {
            orchestrator,
            lines: input.lines(),
        }
    }

    /// Runs until `/quit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        if self.orchestrator.snapshot().await.mode().is_none() {
            println!("{}", mode_menu());
        }
        while let Some(line) = self.lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }
            if let Err(e) = self.dispatch(command).await {
                println!("error: {:#}", e);
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, command: Command) -> Result<()> {
        let orchestrator = self.orchestrator.clone();
        let mode = orchestrator.snapshot().await.mode();

        match command {
            Command::Mode(mode) => orchestrator.select(mode).await,
            Command::Back => {
                let unsaved = orchestrator.snapshot().await.has_unsaved_work();
                let confirmed = !unsaved
                    || self
                        .confirm("You have unsaved work. Are you sure you want to go back?")
                        .await?;
                orchestrator.back(|| confirmed).await;
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
            _ if mode.is_none() => println!("{}", mode_menu()),
            Command::Topic(topic) => {
                spawn_turn(async move { orchestrator.submit_topic(&topic).await });
            }
            Command::NewTopic => {
                if !orchestrator.change_topic().await {
                    println!("/new applies to the teaching modes.");
                }
            }
            Command::Upload(path) => {
                let (name, content) = read_upload(&path).await?;
                spawn_turn(async move { orchestrator.upload_file(&name, content).await });
            }
            Command::Edit => {
                println!("Enter code; finish with a line containing only '{}'.", END_OF_BLOCK);
                let code = self.read_block().await?;
                orchestrator.update_code(code).await;
            }
            Command::ShowCode => {
                let state = orchestrator.snapshot().await;
                println!(
                    "[editor: {}]\n{}\n[/editor]",
                    state.active_language(),
                    state.pending_code()
                );
            }
            Command::Submit => {
                spawn_turn(async move { orchestrator.submit_editor_code().await });
            }
            Command::Diagram(request) => {
                spawn_turn(async move { orchestrator.submit_schema_request(&request, None).await });
            }
            Command::Say(text) if mode == Some(Mode::Analyzing) => {
                debug!(%text, "Free text ignored in analysis mode");
                println!("In analysis mode, use /upload <path> or /edit then /submit.");
            }
            Command::Say(text) => {
                spawn_turn(async move { orchestrator.submit_teaching_turn(&text, false).await });
            }
        }
        Ok(())
    }

    async fn confirm(&mut self, question: &str) -> Result<bool> {
        println!("{} [y/N]", question);
        let answer = self.lines.next_line().await?.unwrap_or_default();
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }

    async fn read_block(&mut self) -> Result<String> {
        let mut block = Vec::new();
        while let Some(line) = self.lines.next_line().await? {
            if line.trim_end() == END_OF_BLOCK {
                break;
            }
            block.push(line);
        }
        Ok(block.join("\n"))
    }
}

/// Reads a file for upload, returning its display name and contents.
pub async fn read_upload(path: &Path) -> Result<(String, String)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("'{}' is not a file path", path.display()))?
        .to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Could not read {}", path.display()))?;
    Ok((name, content))
}

/// Runs a turn in the background so the prompt stays responsive.
fn spawn_turn<F>(turn: F)
where
    F: Future<Output = TurnOutcome> + Send + 'static,
{
    tokio::spawn(async move { report(turn.await) });
}

fn report(outcome: TurnOutcome) {
    match outcome {
        TurnOutcome::Dropped => println!("(still waiting on the previous reply)"),
        TurnOutcome::Ignored => println!("(nothing to send)"),
        TurnOutcome::Stale => debug!("Reply arrived for a discarded session"),
        // Dropping the handle detaches the diagram task; it still lands in the log.
        TurnOutcome::Completed { .. } | TurnOutcome::Failed(_) => {}
    }
}
