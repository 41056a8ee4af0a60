use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

use crate::errors::{GridPilotError, GridPilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::sse_parser;
use crate::llm::types::{CallConfig, ChatMessage, ContentPart, LlmResponse, StreamChunkKind};

const OMITTED_IMAGE: &str = "<omitted_base64_image>";

pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: String, api_key: String, client: reqwest::Client) -> Self {
        Self {
            id,
            api_base,
            api_key,
            client,
        }
    }
}

/// Render messages in chat-completions shape; images become data URIs.
fn wire_messages(messages: &[ChatMessage]) -> serde_json::Value {
    let rendered: Vec<serde_json::Value> = messages
        .iter()
        .map(|m| {
            let parts: Vec<serde_json::Value> = m
                .content
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => serde_json::json!({ "type": "text", "text": text }),
                    ContentPart::Image { media_type, data } => serde_json::json!({
                        "type": "image_url",
                        "image_url": { "url": format!("data:{media_type};base64,{data}") },
                    }),
                })
                .collect();
            serde_json::json!({ "role": m.role, "content": parts })
        })
        .collect();
    serde_json::Value::Array(rendered)
}

/// Copy of the body with image payloads replaced, for logging.
fn sanitized(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) == Some("image_url") {
                    if let Some(url) = part.get_mut("image_url").and_then(|u| u.get_mut("url")) {
                        *url = serde_json::Value::String(OMITTED_IMAGE.to_string());
                    }
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> GridPilotResult<LlmResponse> {
        let body = serde_json::json!({
            "model": cfg.model,
            "messages": wire_messages(&messages),
            "stream": cfg.stream,
            "temperature": cfg.temperature,
            "max_tokens": cfg.max_tokens,
        });

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            stream = cfg.stream,
            "sending LLM request"
        );
        tracing::debug!(body = %sanitized(&body), "request body (sanitized, base64 omitted)");

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(GridPilotError::LlmProvider(format!("{status}: {err_body}")));
        }

        if cfg.stream {
            self.handle_stream(response).await
        } else {
            self.handle_json(response).await
        }
    }
}

impl OpenAiCompatibleProvider {
    async fn handle_stream(&self, response: reqwest::Response) -> GridPilotResult<LlmResponse> {
        let out = accumulate_sse(response.bytes_stream()).await?;
        tracing::info!(
            content_len = out.content.len(),
            reasoning_len = out.reasoning.len(),
            "LLM stream complete"
        );
        Ok(out)
    }

    async fn handle_json(&self, response: reqwest::Response) -> GridPilotResult<LlmResponse> {
        let json: serde_json::Value = response.json().await?;
        let out = parse_completion(&json);
        tracing::info!(content_len = out.content.len(), "LLM JSON response received");
        Ok(out)
    }
}

/// Accumulate an SSE byte stream into one response.
///
/// Bytes are buffered until a full line arrives, so a UTF-8 sequence split
/// across network chunks is decoded intact.
async fn accumulate_sse<S, B, E>(mut stream: S) -> GridPilotResult<LlmResponse>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    GridPilotError: From<E>,
{
    let mut line_buf: Vec<u8> = Vec::new();
    let mut out = LlmResponse::default();

    while let Some(result) = stream.next().await {
        line_buf.extend_from_slice(result?.as_ref());
        while let Some(pos) = line_buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = line_buf.drain(..=pos).collect();
            if apply_sse_line(&String::from_utf8_lossy(&line), &mut out) {
                return Ok(out);
            }
        }
    }
    if !line_buf.is_empty() {
        apply_sse_line(&String::from_utf8_lossy(&line_buf), &mut out);
    }
    Ok(out)
}

/// Fold one SSE line into `out`. Returns true at end of stream.
fn apply_sse_line(line: &str, out: &mut LlmResponse) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    match sse_parser::parse_sse_line(line) {
        Ok(Some(chunk)) => match chunk.kind {
            StreamChunkKind::Reasoning => out.reasoning.push_str(&chunk.content),
            StreamChunkKind::Content => out.content.push_str(&chunk.content),
            StreamChunkKind::Done => return true,
        },
        Ok(None) => {}
        Err(e) => tracing::debug!("SSE parse skipped: {e}"),
    }
    false
}

fn parse_completion(json: &serde_json::Value) -> LlmResponse {
    let message = &json["choices"][0]["message"];
    LlmResponse {
        content: message["content"].as_str().unwrap_or("").to_string(),
        reasoning: message["reasoning_content"].as_str().unwrap_or("").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Vec<ChatMessage> {
        vec![ChatMessage::user(vec![
            ContentPart::Image {
                media_type: "image/jpeg".into(),
                data: "QUJD".into(),
            },
            ContentPart::Text { text: "task".into() },
        ])]
    }

    #[test]
    fn images_become_data_uris() {
        let wire = wire_messages(&request());
        assert_eq!(wire[0]["role"], "user");
        assert_eq!(wire[0]["content"][0]["type"], "image_url");
        assert_eq!(wire[0]["content"][0]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
        assert_eq!(wire[0]["content"][1]["text"], "task");
    }

    #[test]
    fn logged_body_omits_image_payload() {
        let body = serde_json::json!({ "model": "m", "messages": wire_messages(&request()) });
        let logged = sanitized(&body);
        assert!(!logged.contains("QUJD"));
        assert!(logged.contains(OMITTED_IMAGE));
        assert!(logged.contains("task"));
    }

    fn chunked(parts: Vec<Vec<u8>>) -> impl Stream<Item = GridPilotResult<Vec<u8>>> + Unpin {
        futures_util::stream::iter(parts.into_iter().map(Ok))
    }

    #[tokio::test]
    async fn multibyte_char_split_across_chunks_survives() {
        let raw = "data: {\"choices\":[{\"delta\":{\"content\":\"打开\"}}]}\n\ndata: [DONE]\n".as_bytes();
        // Split inside the three-byte encoding of the first character.
        let cut = raw.iter().position(|&b| b >= 0x80).unwrap() + 1;
        let out = accumulate_sse(chunked(vec![raw[..cut].to_vec(), raw[cut..].to_vec()]))
            .await
            .unwrap();
        assert_eq!(out.content, "打开");
    }

    #[tokio::test]
    async fn stream_collects_reasoning_and_stops_at_done() {
        let raw = concat!(
            ": keep-alive\n",
            "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"look\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"{\\\"completed\\\":\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"true}\"}}]}\n",
            "data: [DONE]\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n",
        )
        .as_bytes();
        let parts = raw.chunks(7).map(<[u8]>::to_vec).collect();
        let out = accumulate_sse(chunked(parts)).await.unwrap();
        assert_eq!(out.reasoning, "look");
        assert_eq!(out.content, "{\"completed\":true}");
    }

    #[tokio::test]
    async fn final_line_without_newline_is_kept() {
        let raw = b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}".to_vec();
        let out = accumulate_sse(chunked(vec![raw])).await.unwrap();
        assert_eq!(out.content, "ok");
    }

    #[test]
    fn completion_content_is_extracted() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"completed\":false}" } }]
        });
        assert_eq!(parse_completion(&json).content, "{\"completed\":false}");
        assert_eq!(parse_completion(&serde_json::json!({})).content, "");
    }
}
