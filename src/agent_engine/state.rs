use std::fmt;

use serde::{Deserialize, Serialize};

/// One step the model asked for. Each variant carries exactly its required
/// fields, so deserializing a reply's `action` object validates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Move { x: i32, y: i32 },
    Click { x: i32, y: i32 },
    Type { text: String },
    Press { key: String },
    /// Positive scrolls up.
    Scroll { amount: i32 },
    None,
}

/// Kinds accepted in the `action.type` field.
pub const ACTION_KINDS: &[&str] = &["move", "click", "type", "press", "scroll", "none"];

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Move { .. } => "move",
            Action::Click { .. } => "click",
            Action::Type { .. } => "type",
            Action::Press { .. } => "press",
            Action::Scroll { .. } => "scroll",
            Action::None => "none",
        }
    }

    /// History line quoted back to the model, e.g. `click: {"type":"click","x":1,"y":2}`.
    pub fn summary(&self) -> String {
        let body = serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"));
        format!("{}: {body}", self.kind())
    }

    /// Short label for archived screenshot file names.
    pub fn archive_label(&self) -> String {
        match self {
            Action::Move { x, y } | Action::Click { x, y } => {
                format!("{}_at_{x}_{y}", self.kind())
            }
            Action::Type { text } => {
                let prefix: String = text.chars().take(20).collect();
                format!("type_{prefix}")
            }
            _ => self.kind().to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move { x, y } => write!(f, "move to ({x}, {y})"),
            Action::Click { x, y } => write!(f, "click at ({x}, {y})"),
            Action::Type { text } => write!(f, "type {text:?}"),
            Action::Press { key } => write!(f, "press {key}"),
            Action::Scroll { amount } => write!(f, "scroll {amount}"),
            Action::None => write!(f, "no action"),
        }
    }
}

/// A validated model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub infer: String,
    pub action: Action,
    pub completed: bool,
    /// History line for the action as the model sent it.
    pub summary: String,
}

impl Decision {
    /// Safe default for unusable replies: do nothing, keep going.
    pub fn fallback() -> Self {
        Self {
            infer: String::new(),
            action: Action::None,
            completed: false,
            summary: String::new(),
        }
    }
}

/// Where the control loop is within one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Capturing,
    Deciding,
    AwaitingConfirmation,
    Executing,
    Settling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// The operator declined at the confirmation gate.
    Aborted,
    /// Ctrl-C or an external stop request.
    Interrupted,
    LimitReached(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    pub steps: u32,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
