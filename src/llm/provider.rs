use async_trait::async_trait;

use crate::errors::GridPilotResult;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};

/// Unified inference interface. New backends implement this and are wired up
/// through `[llm.providers]` in config.toml.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Identifier matching the config.toml key.
    fn name(&self) -> &str;

    /// Send one request and return the full reply text. Non-2xx statuses are errors.
    async fn chat(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> GridPilotResult<LlmResponse>;
}
