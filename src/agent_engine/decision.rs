/// Decision client: asks the vision model for the next action and turns its
/// free-form reply into a validated [`Decision`].
///
/// Parsing is strict first, then lenient: the whole reply as JSON, then the
/// first brace-balanced span, then everything between the first `{` and the
/// last `}`. Anything unusable degrades to [`Decision::fallback`].
use std::sync::Arc;

use serde_json::Value;

use crate::agent_engine::session::Session;
use crate::agent_engine::prompt::build_request;
use crate::agent_engine::state::{Action, Decision, ACTION_KINDS};
use crate::llm::provider::LlmProvider;
use crate::llm::types::CallConfig;
use crate::perception::types::EncodedFrame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Valid(Decision),
    Fallback(String),
}

pub fn parse_reply(text: &str) -> ReplyOutcome {
    let Some(value) = extract_json(text) else {
        return ReplyOutcome::Fallback("no JSON object found in reply".into());
    };
    match validate(&value) {
        Ok(decision) => ReplyOutcome::Valid(decision),
        Err(reason) => ReplyOutcome::Fallback(reason),
    }
}

fn extract_json(text: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str::<Value>(text.trim()) {
        return Some(v);
    }
    if let Some(span) = first_balanced_span(text) {
        if let Ok(v) = serde_json::from_str::<Value>(span) {
            return Some(v);
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end]).ok()
}

/// First top-level `{...}` whose braces balance, ignoring braces inside strings.
pub fn first_balanced_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn validate(value: &Value) -> Result<Decision, String> {
    let obj = value.as_object().ok_or("reply is not a JSON object")?;
    let action = obj.get("action").ok_or("reply has no 'action' field")?;
    let completed = obj.get("completed").ok_or("reply has no 'completed' field")?;

    let action_obj = action.as_object().ok_or("'action' is not an object")?;
    let kind = action_obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or("'action.type' is missing or not a string")?;
    if !ACTION_KINDS.contains(&kind) {
        return Err(format!("unknown action type '{kind}'"));
    }
    let completed = completed.as_bool().ok_or("'completed' is not a boolean")?;

    let infer = obj
        .get("infer")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let summary = format!("{kind}: {action}");

    let action = serde_json::from_value::<Action>(action.clone())
        .map_err(|e| format!("'{kind}' action is malformed: {e}"))?;

    Ok(Decision {
        infer,
        action,
        completed,
        summary,
    })
}

pub struct DecisionClient {
    provider: Arc<dyn LlmProvider>,
    call: CallConfig,
    history_window: usize,
}

impl DecisionClient {
    pub fn new(provider: Arc<dyn LlmProvider>, call: CallConfig, history_window: usize) -> Self {
        Self {
            provider,
            call,
            history_window,
        }
    }

    /// Never fails: transport errors and bad replies yield a fallback decision.
    pub async fn decide(&self, session: &mut Session, frame: &EncodedFrame) -> Decision {
        let messages = build_request(session, frame, self.history_window);
        tracing::info!(provider = %self.provider.name(), model = %self.call.model, "requesting decision");

        let reply = match self.provider.chat(messages, &self.call).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "decision request failed, falling back to no action");
                return Decision::fallback();
            }
        };
        tracing::info!(reply = %reply.content, "model reply");

        match parse_reply(&reply.content) {
            ReplyOutcome::Valid(decision) => {
                session.history.push(decision.summary.clone());
                tracing::info!(
                    action = %decision.action,
                    completed = decision.completed,
                    infer = %decision.infer,
                    "decision"
                );
                decision
            }
            ReplyOutcome::Fallback(reason) => {
                tracing::error!(reason = %reason, reply = %reply.content, "unusable reply, falling back to no action");
                Decision::fallback()
            }
        }
    }
}
