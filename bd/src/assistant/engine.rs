//! Two-round tool-calling assistant
//!
//! One turn runs a fixed sequence of phases:
//!
//! ```text
//! AwaitingModel ──(tool calls)──> ExecutingTools ──> AwaitingFinal ──> Done
//!       └──────────(plain answer)─────────────────────────────────────┘
//! ```
//!
//! The final request carries no tool definitions, so the model cannot ask
//! for a second tool round. Tool writes are staged in the turn's
//! `ToolContext` and committed only once the final answer arrived.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AssistantError;
use super::context::gather;
use crate::llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmClient, Message, Role, StreamChunk, TokenUsage, ToolCall,
};
use crate::prompts::PromptLoader;
use crate::state::StateManager;
use crate::tools::{ToolContext, ToolExecutor, ToolResult};

const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Opening message when a briefing is requested without history
const BRIEFING_REQUEST: &str = "Gere o briefing diário de hoje.";

/// What the caller wants from the assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssistantAction {
    #[default]
    Chat,
    DailyBriefing,
}

impl AssistantAction {
    /// Name of the system prompt template
    pub fn template(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::DailyBriefing => "daily_briefing",
        }
    }
}

impl std::fmt::Display for AssistantAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.template())
    }
}

impl std::str::FromStr for AssistantAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "daily_briefing" | "briefing" => Ok(Self::DailyBriefing),
            _ => Err(format!("Unknown action: {}", s)),
        }
    }
}

/// One executed tool call, as reported back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub input: Value,
    pub result: String,
    pub is_error: bool,
}

/// Outcome of a successful turn
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub content: String,
    pub action: AssistantAction,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Staged writes applied to the store
    pub committed_writes: usize,
    pub usage: TokenUsage,
}

enum Phase {
    AwaitingModel,
    ExecutingTools {
        preamble: Option<String>,
        calls: Vec<ToolCall>,
    },
    AwaitingFinal,
    Done(String),
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Self::AwaitingModel => "awaiting_model",
            Self::ExecutingTools { .. } => "executing_tools",
            Self::AwaitingFinal => "awaiting_final",
            Self::Done(_) => "done",
        }
    }
}

/// AI manager for one owner
pub struct Assistant {
    llm: Arc<dyn LlmClient>,
    state: StateManager,
    executor: ToolExecutor,
    prompts: PromptLoader,
    max_tokens: u32,
}

impl Assistant {
    pub fn new(llm: Arc<dyn LlmClient>, state: StateManager) -> Self {
        Self {
            llm,
            state,
            executor: ToolExecutor::standard(),
            prompts: PromptLoader::embedded_only(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptLoader) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_executor(mut self, executor: ToolExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Answer the conversation with a whole completion
    pub async fn respond(
        &self,
        history: Vec<Message>,
        action: AssistantAction,
        today: NaiveDate,
    ) -> Result<AssistantReply, AssistantError> {
        self.run(history, action, today, None).await
    }

    /// Answer the conversation, streaming the final round through `chunk_tx`
    pub async fn respond_streaming(
        &self,
        history: Vec<Message>,
        action: AssistantAction,
        today: NaiveDate,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<AssistantReply, AssistantError> {
        self.run(history, action, today, Some(chunk_tx)).await
    }

    fn prepare_history(&self, mut history: Vec<Message>, action: AssistantAction) -> Result<Vec<Message>, AssistantError> {
        if action == AssistantAction::DailyBriefing && history.is_empty() {
            history.push(Message::user(BRIEFING_REQUEST));
        }
        match history.last() {
            None => Err(AssistantError::Validation("conversation is empty".to_string())),
            Some(last) if last.role != Role::User => Err(AssistantError::Validation(
                "last message must come from the user".to_string(),
            )),
            Some(_) => Ok(history),
        }
    }

    async fn run(
        &self,
        history: Vec<Message>,
        action: AssistantAction,
        today: NaiveDate,
        chunk_tx: Option<mpsc::Sender<StreamChunk>>,
    ) -> Result<AssistantReply, AssistantError> {
        debug!(%action, %today, history_len = history.len(), streaming = chunk_tx.is_some(), "run: called");
        let mut messages = self.prepare_history(history, action)?;

        let prompt_ctx = gather(&self.state, today, self.executor.tool_names()).await?;
        let system_prompt = self
            .prompts
            .render(action.template(), &prompt_ctx)
            .map_err(|e| AssistantError::Prompt(e.to_string()))?;

        let tool_ctx = ToolContext::new(self.state.clone(), today);
        let mut usage = TokenUsage::default();
        let mut records = Vec::new();
        let mut phase = Phase::AwaitingModel;

        let content = loop {
            debug!(phase = phase.name(), "run: phase");
            phase = match phase {
                Phase::AwaitingModel => {
                    let request = self.request(&system_prompt, &messages, true);
                    let response = self.llm.complete(request).await?;
                    usage.add(&response.usage);

                    if response.tool_calls.is_empty() {
                        let text = non_empty(response.content)?;
                        // Nothing else will stream; hand the whole answer over
                        if let Some(tx) = &chunk_tx {
                            let _ = tx.send(StreamChunk::TextDelta(text.clone())).await;
                        }
                        Phase::Done(text)
                    } else {
                        Phase::ExecutingTools {
                            preamble: response.content,
                            calls: response.tool_calls,
                        }
                    }
                }
                Phase::ExecutingTools { preamble, calls } => {
                    info!(count = calls.len(), "Executing tool calls");
                    let results = self.executor.execute_all(&calls, &tool_ctx).await;
                    records.extend(calls.iter().zip(&results).map(|(call, (_, result))| record(call, result)));
                    messages.push(tool_use_message(preamble, &calls));
                    messages.push(Message::user_blocks(
                        results
                            .iter()
                            .map(|(id, result)| ContentBlock::tool_result(id, &result.content, result.is_error))
                            .collect(),
                    ));
                    Phase::AwaitingFinal
                }
                Phase::AwaitingFinal => {
                    let request = self.request(&system_prompt, &messages, false);
                    let response = match &chunk_tx {
                        Some(tx) => self.llm.stream(request, tx.clone()).await,
                        None => self.llm.complete(request).await,
                    };
                    let response = match response {
                        Ok(r) => r,
                        Err(e) => {
                            tool_ctx.discard().await;
                            return Err(e.into());
                        }
                    };
                    usage.add(&response.usage);
                    if !response.tool_calls.is_empty() {
                        warn!(
                            count = response.tool_calls.len(),
                            "Ignoring tool calls requested in the final round"
                        );
                    }
                    match final_text(response) {
                        Ok(text) => Phase::Done(text),
                        Err(e) => {
                            tool_ctx.discard().await;
                            return Err(e);
                        }
                    }
                }
                Phase::Done(content) => break content,
            };
        };

        let committed_writes = tool_ctx.commit().await?;
        info!(%action, tools = records.len(), committed_writes, "Assistant turn complete");
        Ok(AssistantReply {
            content,
            action,
            tool_calls: records,
            committed_writes,
            usage,
        })
    }

    fn request(&self, system_prompt: &str, messages: &[Message], with_tools: bool) -> CompletionRequest {
        CompletionRequest {
            system_prompt: system_prompt.to_string(),
            messages: messages.to_vec(),
            tools: if with_tools { self.executor.definitions() } else { Vec::new() },
            max_tokens: self.max_tokens,
        }
    }
}

fn non_empty(content: Option<String>) -> Result<String, AssistantError> {
    content
        .filter(|c| !c.trim().is_empty())
        .ok_or(AssistantError::EmptyResponse)
}

fn final_text(response: CompletionResponse) -> Result<String, AssistantError> {
    non_empty(response.content)
}

fn tool_use_message(preamble: Option<String>, calls: &[ToolCall]) -> Message {
    let mut blocks: Vec<ContentBlock> = preamble.into_iter().map(ContentBlock::text).collect();
    blocks.extend(calls.iter().map(ContentBlock::tool_use));
    Message::assistant_blocks(blocks)
}

fn record(call: &ToolCall, result: &ToolResult) -> ToolCallRecord {
    ToolCallRecord {
        name: call.name.clone(),
        input: call.input.clone(),
        result: result.content.clone(),
        is_error: result.is_error,
    }
}
