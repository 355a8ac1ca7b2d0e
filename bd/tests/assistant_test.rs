//! Integration tests for the AI manager and snapshot export
//!
//! The model is replaced by a scripted client; everything else (tools, prompts,
//! store) is the real thing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;

use bizdesk::assistant::{Assistant, AssistantAction, AssistantError};
use bizdesk::domain::{Client, MetricValues, Notification, PeriodType, Task};
use bizdesk::export::MetricsSnapshot;
use bizdesk::goals::{GoalTracker, NewGoal};
use bizdesk::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StreamChunk, ToolCall};
use bizdesk::state::StateManager;

/// Plays back canned results and records every request
struct ScriptedClient {
    script: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    fn new(script: Vec<Result<CompletionResponse, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".to_string())))
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        let response = self.complete(request).await?;
        if let Some(text) = &response.content {
            let _ = chunk_tx.send(StreamChunk::TextDelta(text.clone())).await;
        }
        Ok(response)
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()
}

async fn seeded_store(dir: &TempDir) -> StateManager {
    let state = StateManager::spawn(dir.path().join("store"), "ana").expect("Failed to spawn state manager");

    let mut client = Client::new("ana", "Acme");
    client.mrr = 1500.0;
    state.create(&client).await.unwrap();
    state.create(&Task::new("ana", "Enviar proposta")).await.unwrap();

    let tracker = GoalTracker::new(Arc::new(state.clone()), "ana");
    let goal = tracker
        .create_draft(NewGoal {
            period_type: PeriodType::Monthly,
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            title: None,
            target: MetricValues {
                mrr: 3000.0,
                new_clients: 2.0,
                tasks_completed: 10.0,
                projects_delivered: 1.0,
            },
            ai_suggested: None,
        })
        .await
        .unwrap();
    tracker.confirm(&goal.id).await.unwrap();
    state
}

#[tokio::test]
async fn test_briefing_with_tool_round_commits_writes() {
    let dir = TempDir::new().unwrap();
    let state = seeded_store(&dir).await;
    let llm = ScriptedClient::new(vec![
        Ok(CompletionResponse::tools(vec![
            ToolCall::new("c1", "get_clients_summary", json!({})),
            ToolCall::new(
                "c2",
                "create_notification",
                json!({"title": "Meta de MRR", "message": "Faltam R$ 1500", "kind": "warning"}),
            ),
        ])),
        Ok(CompletionResponse::text("Bom dia! Seu MRR está em R$ 1500.")),
    ]);
    let assistant = Assistant::new(llm.clone(), state.clone());

    let reply = assistant
        .respond(Vec::new(), AssistantAction::DailyBriefing, today())
        .await
        .unwrap();

    assert_eq!(reply.content, "Bom dia! Seu MRR está em R$ 1500.");
    assert_eq!(reply.tool_calls.len(), 2);
    assert!(reply.tool_calls.iter().all(|c| !c.is_error));
    assert_eq!(reply.committed_writes, 1);

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].system_prompt.contains("Meta de Março"));
    assert_eq!(requests[0].tools.len(), 8);
    assert!(requests[1].tools.is_empty());

    let notifications = state.list_owned::<Notification>(vec![]).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "Meta de MRR");
}

#[tokio::test]
async fn test_failed_final_round_discards_writes() {
    let dir = TempDir::new().unwrap();
    let state = seeded_store(&dir).await;
    let llm = ScriptedClient::new(vec![
        Ok(CompletionResponse::tools(vec![ToolCall::new(
            "c1",
            "create_task",
            json!({"title": "Ligar para Acme"}),
        )])),
        Err(LlmError::ApiError {
            status: 500,
            message: "upstream down".to_string(),
        }),
    ]);
    let assistant = Assistant::new(llm, state.clone());

    let (tx, mut rx) = mpsc::channel(16);
    let err = assistant
        .respond_streaming(
            vec![bizdesk::llm::Message::user("Crie uma tarefa")],
            AssistantAction::Chat,
            today(),
            tx,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::Llm(_)));
    assert!(rx.recv().await.is_none());

    // Only the seeded task exists
    let tasks = state.list_owned::<Task>(vec![]).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Enviar proposta");
}

#[tokio::test]
async fn test_snapshot_export() {
    let dir = TempDir::new().unwrap();
    let state = seeded_store(&dir).await;

    let snapshot = MetricsSnapshot::collect(&state, today()).await.unwrap();
    assert_eq!(snapshot.business.mrr, 1500.0);
    assert_eq!(snapshot.business.pending_tasks, 1);
    assert_eq!(snapshot.goals.len(), 1);

    let csv = snapshot.to_csv();
    assert!(csv.starts_with("section,metric,value"));
    assert!(csv.lines().any(|l| l == "business,mrr,1500.00"));

    let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(json["business"]["active_clients"], 1);
    assert_eq!(json["goals"][0]["title"], "Meta de Março");
}
