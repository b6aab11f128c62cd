//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI and any endpoint exposing `/v1/chat/completions`
//! (OpenRouter, Ollama, vLLM, llama.cpp, ...).
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Upstream error payloads surfaced as [`ProviderError`]

use std::time::Duration;

use agora_core::error::ProviderError;
use agora_core::message::{Message, Role};
use agora_core::provider::*;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// An OpenAI-compatible LLM provider.
///
/// Holds one `reqwest::Client` (a pooled, thread-safe handle). Build the
/// provider once at startup and share it behind an `Arc`.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        body
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e, e.is_timeout()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request, false);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self.post(&body, false).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let usage = api_response.usage.map(Usage::from);

        Ok(ProviderResponse {
            message: Message::new(Role::Assistant, choice.message.content.unwrap_or_default()),
            usage,
            model: api_response.model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let body = Self::request_body(&request, true);

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self.post(&body, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and parse chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                lines.extend(&bytes);

                // Only complete lines are decoded; a partial line waits for more bytes
                while let Some(next) = lines.next_line() {
                    let line = match next {
                        Ok(line) => line,
                        Err(err) => {
                            let _ = tx.send(Err(err)).await;
                            return;
                        }
                    };

                    match parse_sse_line(&line) {
                        SseLine::Skip => {}
                        SseLine::Chunk(chunk) => {
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        SseLine::Done => {
                            let _ = tx.send(Ok(StreamChunk::done())).await;
                            return;
                        }
                        SseLine::Failed(err) => {
                            trace!(provider = %provider_name, line = %line, "Upstream stream failed");
                            let _ = tx.send(Err(err)).await;
                            return;
                        }
                    }
                }
            }

            // Body ended without [DONE]
            let _ = tx.send(Ok(StreamChunk::done())).await;
        });

        Ok(rx)
    }
}

/// Accumulates raw body bytes and yields complete `\n`-terminated lines.
///
/// Network reads can end in the middle of a multi-byte character, so bytes
/// are held until the line they belong to is complete and only then decoded.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next complete line without its `\n` / `\r\n` terminator.
    fn next_line(&mut self) -> Option<Result<String, ProviderError>> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        Some(String::from_utf8(line).map_err(|e| {
            ProviderError::StreamInterrupted(format!("invalid UTF-8 in stream: {e}"))
        }))
    }
}

/// Outcome of parsing one line of an upstream SSE body.
#[derive(Debug)]
enum SseLine {
    /// Blank line, comment, non-data field, or a chunk with nothing to report
    Skip,
    Chunk(StreamChunk),
    /// `data: [DONE]`
    Done,
    Failed(ProviderError),
}

fn parse_sse_line(line: &str) -> SseLine {
    // Skip empty lines and SSE comments
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Skip;
    }

    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    let stream_resp = match serde_json::from_str::<StreamResponse>(data) {
        Ok(resp) => resp,
        Err(e) => {
            return SseLine::Failed(ProviderError::ApiError {
                status_code: 200,
                message: format!("Malformed stream chunk: {e}"),
            });
        }
    };

    if let Some(error) = stream_resp.error {
        return SseLine::Failed(ProviderError::ApiError {
            status_code: 200,
            message: error.message,
        });
    }

    // With stream_options.include_usage the usage block rides on its own
    // trailing chunk (empty choices), but some servers attach it to the last
    // content delta. Either way the stream ends at [DONE], not here.
    let usage = stream_resp.usage.map(Usage::from);
    let content = stream_resp
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content);

    if content.is_none() && usage.is_none() {
        return SseLine::Skip;
    }

    SseLine::Chunk(StreamChunk {
        content,
        usage,
        done: false,
    })
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let provider =
            OpenAiCompatProvider::new("local", "http://localhost:8080/v1/", "", Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are Socrates"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn request_body_flags() {
        let request = ProviderRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Message::system("You are Confucius")],
            temperature: 0.7,
            max_tokens: Some(500),
            stream: true,
        };

        let streaming = OpenAiCompatProvider::request_body(&request, true);
        assert_eq!(streaming["stream"], true);
        assert_eq!(streaming["max_tokens"], 500);
        assert_eq!(streaming["messages"][0]["role"], "system");
        assert!(streaming.get("stream_options").is_some());

        let buffered = OpenAiCompatProvider::request_body(&request, false);
        assert_eq!(buffered["stream"], false);
        assert!(buffered.get("stream_options").is_none());
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        match parse_sse_line(line) {
            SseLine::Chunk(chunk) => {
                assert_eq!(chunk.content.as_deref(), Some("Hello"));
                assert!(!chunk.done);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_role_only_delta_is_skipped() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#;
        assert!(matches!(parse_sse_line(line), SseLine::Skip));
    }

    #[test]
    fn parse_done_marker() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseLine::Done));
        assert!(matches!(parse_sse_line("data:[DONE]"), SseLine::Done));
    }

    #[test]
    fn parse_skips_comments_and_other_fields() {
        assert!(matches!(parse_sse_line(""), SseLine::Skip));
        assert!(matches!(parse_sse_line(": keep-alive"), SseLine::Skip));
        assert!(matches!(parse_sse_line("event: message"), SseLine::Skip));
    }

    #[test]
    fn parse_usage_only_chunk_does_not_end_stream() {
        let line = r#"data: {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        match parse_sse_line(line) {
            SseLine::Chunk(chunk) => {
                assert!(!chunk.done);
                assert!(chunk.content.is_none());
                assert_eq!(chunk.usage.unwrap().total_tokens, 15);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_content_with_usage_keeps_both() {
        let line = r#"data: {"choices":[{"delta":{"content":"Farewell."}}],"usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#;
        match parse_sse_line(line) {
            SseLine::Chunk(chunk) => {
                assert_eq!(chunk.content.as_deref(), Some("Farewell."));
                assert_eq!(chunk.usage.unwrap().completion_tokens, 2);
                assert!(!chunk.done);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_null_usage_is_ignored() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi"}}],"usage":null}"#;
        match parse_sse_line(line) {
            SseLine::Chunk(chunk) => {
                assert_eq!(chunk.content.as_deref(), Some("Hi"));
                assert!(chunk.usage.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    // --- line buffering tests ---

    #[test]
    fn line_buffer_waits_for_newline() {
        let mut lines = LineBuffer::default();
        lines.extend(b"data: {\"a\"");
        assert!(lines.next_line().is_none());

        lines.extend(b":1}\r\n\n");
        assert_eq!(lines.next_line().unwrap().unwrap(), "data: {\"a\":1}");
        assert_eq!(lines.next_line().unwrap().unwrap(), "");
        assert!(lines.next_line().is_none());
    }

    #[test]
    fn line_buffer_joins_multibyte_char_split_across_reads() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"Ça va\"}}]}\n".as_bytes();
        // 'Ç' is two bytes; cut between them
        let cut = line.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut lines = LineBuffer::default();
        lines.extend(&line[..cut]);
        assert!(lines.next_line().is_none());
        lines.extend(&line[cut..]);

        let decoded = lines.next_line().unwrap().unwrap();
        assert!(!decoded.contains('\u{FFFD}'));
        match parse_sse_line(&decoded) {
            SseLine::Chunk(chunk) => assert_eq!(chunk.content.as_deref(), Some("Ça va")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn line_buffer_rejects_invalid_utf8() {
        let mut lines = LineBuffer::default();
        lines.extend(b"data: \xFF\xFE\n");
        assert!(matches!(
            lines.next_line(),
            Some(Err(ProviderError::StreamInterrupted(_)))
        ));
    }

    #[test]
    fn parse_upstream_error_payload() {
        let line = r#"data: {"error":{"message":"model overloaded","type":"server_error"}}"#;
        match parse_sse_line(line) {
            SseLine::Failed(ProviderError::ApiError { message, .. }) => {
                assert_eq!(message, "model overloaded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_malformed_chunk_fails() {
        assert!(matches!(
            parse_sse_line("data: {not json"),
            SseLine::Failed(ProviderError::ApiError { .. })
        ));
    }

    #[test]
    fn parse_buffered_response() {
        let data = r#"{
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Know thyself."}}],
            "usage": {"prompt_tokens": 20, "completion_tokens": 3, "total_tokens": 23}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Know thyself."));
        assert_eq!(parsed.usage.unwrap().completion_tokens, 3);
    }
}
