// Human confirmation before each action.
use std::io::{BufRead, IsTerminal, Write};

use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::agent_engine::state::Action;
use crate::errors::{GridPilotError, GridPilotResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Proceed,
    Abort,
}

/// Asks the operator whether the next action may run.
#[async_trait]
pub trait ConfirmationGate: Send {
    async fn confirm(&mut self, action: &Action) -> GridPilotResult<Confirmation>;
}

/// Blocks on a single key: Enter proceeds, Esc or Ctrl-C aborts. Falls back
/// to a line prompt when raw key capture is unavailable.
#[derive(Debug, Default)]
pub struct TerminalGate;

impl TerminalGate {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConfirmationGate for TerminalGate {
    async fn confirm(&mut self, action: &Action) -> GridPilotResult<Confirmation> {
        println!("\nNext action: {action}");
        let answer = tokio::task::spawn_blocking(read_confirmation)
            .await
            .map_err(|e| GridPilotError::Agent(format!("confirmation task failed: {e}")))??;
        tracing::debug!(?answer, "operator answered");
        Ok(answer)
    }
}

fn read_confirmation() -> GridPilotResult<Confirmation> {
    if std::io::stdin().is_terminal() {
        match read_single_key() {
            Ok(answer) => return Ok(answer),
            Err(e) => tracing::debug!(error = %e, "raw key capture unavailable, using line prompt"),
        }
    }
    read_line_answer()
}

fn read_single_key() -> std::io::Result<Confirmation> {
    print!("Press Enter to continue, or Esc to exit ");
    std::io::stdout().flush()?;
    enable_raw_mode()?;
    let answer = wait_for_key();
    disable_raw_mode()?;
    println!();
    answer
}

fn wait_for_key() -> std::io::Result<Confirmation> {
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(Confirmation::Proceed),
            KeyCode::Esc => return Ok(Confirmation::Abort),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(Confirmation::Abort);
            }
            _ => {}
        }
    }
}

fn read_line_answer() -> GridPilotResult<Confirmation> {
    print!("Press Enter to continue, or type e to exit: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    let read = std::io::stdin().lock().read_line(&mut line)?;
    // EOF: nobody is there to confirm.
    if read == 0 {
        return Ok(Confirmation::Abort);
    }
    Ok(line_answer(&line))
}

pub fn line_answer(line: &str) -> Confirmation {
    if line.trim().eq_ignore_ascii_case("e") {
        Confirmation::Abort
    } else {
        Confirmation::Proceed
    }
}
