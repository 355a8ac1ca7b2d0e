//! OpenAI Chat Completions client
//!
//! Blocking and streaming completions with retry on transient statuses.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, Message, MessageContent, Role,
    StopReason, StreamChunk, TokenUsage, ToolCall,
};
use crate::config::LlmConfig;

const MAX_RETRIES: u32 = 3;

const INITIAL_BACKOFF_MS: u64 = 1000;

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 500 | 502 | 503 | 504)
}

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl OpenAIClient {
    /// Build a client from configuration, reading the key from the environment
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        let api_key =
            std::env::var(&config.api_key_env).map_err(|_| LlmError::MissingApiKey(config.api_key_env.clone()))?;
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        debug!(model = %self.model, max_tokens = %request.max_tokens, "build_request_body: called");
        let mut messages = vec![json!({
            "role": "system",
            "content": request.system_prompt,
        })];
        messages.extend(convert_messages(&request.messages));

        let max_tokens = request.max_tokens.min(self.max_tokens);
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });

        // Reasoning models reject max_tokens
        if self.model.starts_with("o1") || self.model.starts_with("o3") || self.model.starts_with("gpt-5") {
            body["max_completion_tokens"] = json!(max_tokens);
        } else {
            body["max_tokens"] = json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools.iter().map(|t| t.to_openai_schema()).collect::<Vec<_>>());
            body["tool_choice"] = json!("auto");
        }
        body
    }

    /// POST the body, retrying transient failures with exponential backoff
    async fn send(&self, body: &Value) -> Result<Response, LlmError> {
        let url = self.endpoint();
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, "send: retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = match self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "send: network error");
                    last_error = Some(LlmError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();
            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(LlmError::RateLimited {
                    retry_after: Duration::from_secs(retry_after),
                });
            }

            if is_retryable_status(status) && attempt < MAX_RETRIES {
                let message = response.text().await.unwrap_or_default();
                debug!(attempt, status, "send: retryable status");
                last_error = Some(LlmError::ApiError { status, message });
                continue;
            }

            if !response.status().is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(LlmError::ApiError { status, message });
            }
            return Ok(response);
        }

        Err(last_error.unwrap_or_else(|| LlmError::InvalidResponse("Max retries exceeded".to_string())))
    }
}

/// Convert conversation messages to OpenAI chat messages
///
/// One internal message holding several tool results becomes one `tool`
/// message per result.
fn convert_messages(messages: &[Message]) -> Vec<Value> {
    let mut result = Vec::new();

    for msg in messages {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        let blocks = match &msg.content {
            MessageContent::Text(text) => {
                result.push(json!({ "role": role, "content": text }));
                continue;
            }
            MessageContent::Blocks(blocks) => blocks,
        };

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in blocks {
            match block {
                ContentBlock::Text { text: t } => text.push_str(t),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(json!({
                    "id": id,
                    "type": "function",
                    "function": { "name": name, "arguments": input.to_string() },
                })),
                ContentBlock::ToolResult {
                    tool_use_id, content, ..
                } => result.push(json!({
                    "role": "tool",
                    "tool_call_id": tool_use_id,
                    "content": content,
                })),
            }
        }

        if !tool_calls.is_empty() {
            let mut msg = json!({ "role": "assistant", "tool_calls": tool_calls });
            if !text.is_empty() {
                msg["content"] = json!(text);
            }
            result.push(msg);
        } else if !text.is_empty() {
            result.push(json!({ "role": role, "content": text }));
        }
    }

    result
}

fn parse_arguments(arguments: &str) -> Value {
    serde_json::from_str(arguments).unwrap_or_else(|_| json!({}))
}

fn parse_response(api_response: OpenAIResponse) -> CompletionResponse {
    let usage = api_response
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    let Some(choice) = api_response.choices.into_iter().next() else {
        return CompletionResponse {
            content: None,
            tool_calls: Vec::new(),
            stop_reason: StopReason::EndTurn,
            usage,
        };
    };

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall::new(tc.id, tc.function.name, parse_arguments(&tc.function.arguments)))
        .collect();

    CompletionResponse {
        content: choice.message.content,
        tool_calls,
        stop_reason: choice
            .finish_reason
            .as_deref()
            .map(StopReason::from_openai)
            .unwrap_or(StopReason::EndTurn),
        usage,
    }
}

/// Assembles a streamed response from SSE `data:` payloads
#[derive(Default)]
struct StreamAccumulator {
    content: String,
    /// index -> (id, name, arguments)
    tool_calls: BTreeMap<usize, (String, String, String)>,
    stop_reason: Option<StopReason>,
    usage: TokenUsage,
}

impl StreamAccumulator {
    /// Absorb one payload, returning the chunks to forward
    fn absorb(&mut self, chunk: OpenAIStreamChunk) -> Vec<StreamChunk> {
        let mut out = Vec::new();

        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(content) = choice.delta.content {
                self.content.push_str(&content);
                out.push(StreamChunk::TextDelta(content));
            }

            for tc in choice.delta.tool_calls.unwrap_or_default() {
                let entry = self.tool_calls.entry(tc.index).or_default();
                if let Some(id) = tc.id {
                    entry.0 = id;
                }
                let Some(function) = tc.function else { continue };
                if let Some(name) = function.name {
                    entry.1 = name.clone();
                    out.push(StreamChunk::ToolUseStart {
                        id: entry.0.clone(),
                        name,
                    });
                }
                if let Some(args) = function.arguments {
                    entry.2.push_str(&args);
                    out.push(StreamChunk::ToolUseDelta {
                        id: entry.0.clone(),
                        json_delta: args,
                    });
                }
            }

            if let Some(reason) = choice.finish_reason {
                self.stop_reason = Some(StopReason::from_openai(&reason));
            }
        }

        if let Some(u) = chunk.usage {
            self.usage = TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            };
        }
        out
    }

    fn finish(self) -> (CompletionResponse, Vec<StreamChunk>) {
        let mut tail = Vec::new();
        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_values()
            .map(|(id, name, args)| {
                tail.push(StreamChunk::ToolUseEnd { id: id.clone() });
                ToolCall::new(id, name, parse_arguments(&args))
            })
            .collect();
        let stop_reason = self.stop_reason.unwrap_or(StopReason::EndTurn);
        tail.push(StreamChunk::MessageDone {
            stop_reason: stop_reason.clone(),
            usage: self.usage.clone(),
        });

        let response = CompletionResponse {
            content: (!self.content.is_empty()).then_some(self.content),
            tool_calls,
            stop_reason,
            usage: self.usage,
        };
        (response, tail)
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(model = %self.model, "complete: called");
        let body = self.build_request_body(&request);
        let response = self.send(&body).await?;
        let api_response: OpenAIResponse = response.json().await?;
        Ok(parse_response(api_response))
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        debug!(model = %self.model, "stream: called");
        let mut body = self.build_request_body(&request);
        body["stream"] = json!(true);
        body["stream_options"] = json!({ "include_usage": true });

        let response = self.send(&body).await?;
        let mut bytes = response.bytes_stream();
        let mut acc = StreamAccumulator::default();
        let mut buffer = String::new();

        while let Some(chunk) = bytes.next().await {
            buffer.push_str(&String::from_utf8_lossy(&chunk?));

            while let Some(line_end) = buffer.find('\n') {
                let line: String = buffer.drain(..=line_end).collect();
                let Some(data) = line.trim().strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    continue;
                }
                match serde_json::from_str::<OpenAIStreamChunk>(data) {
                    Ok(payload) => {
                        for out in acc.absorb(payload) {
                            let _ = chunk_tx.send(out).await;
                        }
                    }
                    Err(e) => warn!(error = %e, "stream: skipping malformed event"),
                }
            }
        }

        let (response, tail) = acc.finish();
        for out in tail {
            let _ = chunk_tx.send(out).await;
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamToolCall {
    index: usize,
    id: Option<String>,
    function: Option<OpenAIStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
