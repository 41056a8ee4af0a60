// Anthropic Messages API adapter.
use async_trait::async_trait;

use crate::errors::{GridPilotError, GridPilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage, ContentPart, LlmResponse};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(id: String, api_base: String, api_key: String, client: reqwest::Client) -> Self {
        Self {
            id,
            api_base,
            api_key,
            client,
        }
    }
}

fn request_body(messages: &[ChatMessage], cfg: &CallConfig) -> serde_json::Value {
    let mut system_text = String::new();
    let mut wire = Vec::new();
    for m in messages {
        if m.role == "system" {
            if !system_text.is_empty() {
                system_text.push('\n');
            }
            system_text.push_str(&m.text());
            continue;
        }
        let blocks: Vec<serde_json::Value> = m
            .content
            .iter()
            .map(|p| match p {
                ContentPart::Text { text } => serde_json::json!({ "type": "text", "text": text }),
                ContentPart::Image { media_type, data } => serde_json::json!({
                    "type": "image",
                    "source": { "type": "base64", "media_type": media_type, "data": data },
                }),
            })
            .collect();
        wire.push(serde_json::json!({ "role": m.role, "content": blocks }));
    }

    let mut body = serde_json::json!({
        "model": cfg.model,
        "max_tokens": cfg.max_tokens,
        "temperature": cfg.temperature,
        "messages": wire,
    });
    if !system_text.is_empty() {
        body["system"] = serde_json::Value::String(system_text);
    }
    body
}

/// Join all text blocks of a Messages API reply.
fn parse_response(json: &serde_json::Value) -> LlmResponse {
    let mut content = String::new();
    if let Some(blocks) = json.get("content").and_then(|c| c.as_array()) {
        for block in blocks {
            if block.get("type").and_then(|t| t.as_str()) != Some("text") {
                continue;
            }
            if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(text);
            }
        }
    }
    LlmResponse {
        content,
        reasoning: String::new(),
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> GridPilotResult<LlmResponse> {
        if cfg.stream {
            tracing::debug!(provider = %self.id, "streaming not supported by this adapter, using a single response");
        }
        let body = request_body(&messages, cfg);
        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            messages = messages.len(),
            "sending LLM request"
        );

        let response = self
            .client
            .post(&self.api_base)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            return Err(GridPilotError::LlmProvider(format!("{status}: {err_body}")));
        }

        let json: serde_json::Value = response.json().await?;
        let out = parse_response(&json);
        tracing::info!(content_len = out.content.len(), "LLM response received");
        Ok(out)
    }
}
