use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::errors::{PhoneClawError, PhoneClawResult};
use crate::llm::provider::ModelClient;
use crate::llm::sse_parser::{self, SseLineBuffer};
use crate::llm::types::{CallConfig, ChatMessage, ModelResponse, StreamChunkKind};
use crate::protocol::segmenter::{split_response, ResponseTimings, StreamSegmenter};

const IMAGE_PLACEHOLDER: &str = "<omitted_base64_image>";

/// Client for any `/chat/completions` endpoint speaking the OpenAI wire format.
pub struct OpenAiCompatibleClient {
    id: String,
    endpoint: String,
    api_key: String,
    call: CallConfig,
    client: reqwest::Client,
    thinking_sink: Option<mpsc::UnboundedSender<String>>,
}

impl OpenAiCompatibleClient {
    pub fn new(
        id: impl Into<String>,
        api_base: &str,
        api_key: impl Into<String>,
        call: CallConfig,
        timeout: Duration,
    ) -> PhoneClawResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id: id.into(),
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key: api_key.into(),
            call,
            client,
            thinking_sink: None,
        })
    }

    /// Thinking text is forwarded here as it streams in. Nothing from the
    /// action part of a reply is ever sent.
    pub fn with_thinking_sink(mut self, sink: mpsc::UnboundedSender<String>) -> Self {
        self.thinking_sink = Some(sink);
        self
    }

    pub fn call_config(&self) -> &CallConfig {
        &self.call
    }

    fn emit_thinking(&self, text: &str) {
        if let Some(sink) = &self.thinking_sink {
            // A closed receiver only means nobody is watching.
            let _ = sink.send(text.to_string());
        }
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.call.model,
            "messages": messages,
            "max_tokens": self.call.max_tokens,
            "temperature": self.call.temperature,
            "top_p": self.call.top_p,
            "frequency_penalty": self.call.frequency_penalty,
            "stream": self.call.stream,
        })
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.id
    }

    async fn request(&self, messages: &[ChatMessage]) -> PhoneClawResult<ModelResponse> {
        let body = self.request_body(messages);

        tracing::debug!(
            provider = %self.id,
            model = %self.call.model,
            stream = self.call.stream,
            messages = messages.len(),
            "sending model request"
        );
        tracing::debug!(body = %sanitize_for_log(&body), "request body (sanitized, base64 omitted)");

        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PhoneClawError::LlmProvider(format!("request to {} failed: {e}", self.endpoint)))?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PhoneClawError::LlmProvider(format!("{status}: {err_body}")));
        }

        let reply = if self.call.stream {
            self.handle_stream(response).await?
        } else {
            self.handle_json(response, started).await?
        };

        tracing::info!(
            provider = %self.id,
            model = %self.call.model,
            ttft_ms = reply.timings.time_to_first_token.map(|d| d.as_millis() as u64),
            phase_switch_ms = reply.timings.time_to_phase_switch.map(|d| d.as_millis() as u64),
            total_ms = reply.timings.total.as_millis() as u64,
            content_len = reply.raw_content.len(),
            "model response complete"
        );
        Ok(reply)
    }
}

impl OpenAiCompatibleClient {
    /// Reads the SSE stream, forwarding thinking text as soon as it is known
    /// not to be part of an action marker.
    async fn handle_stream(&self, response: reqwest::Response) -> PhoneClawResult<ModelResponse> {
        let mut byte_stream = response.bytes_stream();
        let mut lines = SseLineBuffer::new();
        let mut segmenter = StreamSegmenter::new();
        let mut reasoning = String::new();
        let mut finished = false;

        'stream: while let Some(result) = byte_stream.next().await {
            let bytes = result.map_err(|e| PhoneClawError::LlmProvider(format!("stream interrupted: {e}")))?;
            for line in lines.push(&bytes) {
                if self.apply_line(&line, &mut segmenter, &mut reasoning) {
                    finished = true;
                    break 'stream;
                }
            }
        }
        if !finished {
            if let Some(line) = lines.finish() {
                self.apply_line(&line, &mut segmenter, &mut reasoning);
            }
        }

        let done = segmenter.finish();
        Ok(ModelResponse {
            thinking: done.thinking,
            action: done.action,
            raw_content: done.raw,
            reasoning,
            timings: done.timings,
        })
    }

    /// Feeds one SSE line through the segmenter. Returns true at end of stream.
    fn apply_line(&self, line: &str, segmenter: &mut StreamSegmenter, reasoning: &mut String) -> bool {
        match sse_parser::parse_sse_line(line) {
            Ok(Some(chunk)) => match chunk.kind {
                StreamChunkKind::Reasoning => {
                    self.emit_thinking(&chunk.content);
                    reasoning.push_str(&chunk.content);
                }
                StreamChunkKind::Content => {
                    if let Some(safe) = segmenter.push(&chunk.content) {
                        self.emit_thinking(&safe);
                    }
                }
                StreamChunkKind::Done => return true,
            },
            Ok(None) => {}
            Err(e) => {
                tracing::debug!("SSE parse skipped: {e}");
            }
        }
        false
    }

    async fn handle_json(
        &self,
        response: reqwest::Response,
        started: Instant,
    ) -> PhoneClawResult<ModelResponse> {
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PhoneClawError::LlmProvider(format!("invalid response body: {e}")))?;

        let message = &json["choices"][0]["message"];
        let content = message["content"].as_str().unwrap_or("").to_string();
        let reasoning = message["reasoning_content"].as_str().unwrap_or("").to_string();
        let (thinking, action) = split_response(&content);
        if !thinking.is_empty() {
            self.emit_thinking(&thinking);
        }

        let elapsed = started.elapsed();
        Ok(ModelResponse {
            thinking,
            action,
            raw_content: content,
            reasoning,
            timings: ResponseTimings {
                time_to_first_token: Some(elapsed),
                time_to_phase_switch: None,
                total: elapsed,
            },
        })
    }
}

/// Renders a request body for logging with image payloads replaced.
/// The request itself still carries the real images.
pub fn sanitize_for_log(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) != Some("image_url") {
                    continue;
                }
                if let Some(url) = part.get_mut("image_url").and_then(|u| u.get_mut("url")) {
                    *url = serde_json::Value::String(IMAGE_PLACEHOLDER.to_string());
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}
