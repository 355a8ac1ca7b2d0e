//! Business records outside the pipeline
//!
//! Tasks, clients, payments, notifications, insights and reminders. The
//! AI manager reads and writes these; the pipeline only creates clients when
//! a prospect is converted.

use chrono::NaiveDate;
use rowstore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::generate_id;
use super::priority::Priority;

/// Task workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn new(owner_id: &str, title: impl Into<String>) -> Self {
        let title = title.into();
        let now = now_ms();
        Self {
            id: generate_id("task", &title),
            owner_id: owner_id.to_string(),
            title,
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            due_date: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Open and past its due date
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != TaskStatus::Done && self.due_date.is_some_and(|d| d < today)
    }
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "tasks"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("owner_id".to_string(), IndexValue::String(self.owner_id.clone()));
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("priority".to_string(), IndexValue::String(self.priority.to_string()));
        fields
    }
}

/// Client account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Monthly recurring revenue
    pub mrr: f64,
    pub status: ClientStatus,
    /// Prospect this client was converted from
    pub prospect_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Client {
    pub fn new(owner_id: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        let now = now_ms();
        Self {
            id: generate_id("client", &name),
            owner_id: owner_id.to_string(),
            name,
            company: None,
            email: None,
            phone: None,
            mrr: 0.0,
            status: ClientStatus::Active,
            prospect_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Client {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "clients"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("owner_id".to_string(), IndexValue::String(self.owner_id.clone()));
        if let Some(prospect_id) = &self.prospect_id {
            fields.insert("prospect_id".to_string(), IndexValue::String(prospect_id.clone()));
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub owner_id: String,
    pub client_id: Option<String>,
    pub amount: f64,
    pub paid_at: i64,
    pub updated_at: i64,
}

impl Payment {
    pub fn new(owner_id: &str, amount: f64, paid_at: i64) -> Self {
        Self {
            id: generate_id("payment", ""),
            owner_id: owner_id.to_string(),
            client_id: None,
            amount,
            paid_at,
            updated_at: now_ms(),
        }
    }
}

impl Record for Payment {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "payments"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("owner_id".to_string(), IndexValue::String(self.owner_id.clone()));
        fields.insert("paid_at".to_string(), IndexValue::Int(self.paid_at));
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub message: String,
    /// info, warning, success, alert
    pub kind: String,
    pub read: bool,
    pub created_at: i64,
}

impl Notification {
    pub fn new(owner_id: &str, title: impl Into<String>, message: impl Into<String>, kind: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: generate_id("notification", &title),
            owner_id: owner_id.to_string(),
            title,
            message: message.into(),
            kind: kind.into(),
            read: false,
            created_at: now_ms(),
        }
    }
}

impl Record for Notification {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "notifications"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("owner_id".to_string(), IndexValue::String(self.owner_id.clone()));
        fields.insert("read".to_string(), IndexValue::Bool(self.read));
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub created_at: i64,
}

impl Insight {
    pub fn new(owner_id: &str, title: impl Into<String>, content: impl Into<String>, category: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: generate_id("insight", &title),
            owner_id: owner_id.to_string(),
            title,
            content: content.into(),
            category: category.into(),
            created_at: now_ms(),
        }
    }
}

impl Record for Insight {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "insights"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("owner_id".to_string(), IndexValue::String(self.owner_id.clone()));
        fields.insert("category".to_string(), IndexValue::String(self.category.clone()));
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub message: Option<String>,
    pub remind_at: i64,
    pub created_at: i64,
}

impl Reminder {
    pub fn new(owner_id: &str, title: impl Into<String>, remind_at: i64) -> Self {
        let title = title.into();
        Self {
            id: generate_id("reminder", &title),
            owner_id: owner_id.to_string(),
            title,
            message: None,
            remind_at,
            created_at: now_ms(),
        }
    }
}

impl Record for Reminder {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "reminders"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("owner_id".to_string(), IndexValue::String(self.owner_id.clone()));
        fields.insert("remind_at".to_string(), IndexValue::Int(self.remind_at));
        fields
    }
}
