//! ProspectInteraction domain type
//!
//! Append-only log of contact with a prospect. Entries are never updated or
//! reordered; readers sort most-recent-first.

use rowstore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::generate_id;

/// Kind of contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Call,
    Email,
    Meeting,
    Message,
    Proposal,
    Note,
    /// Recorded automatically when a prospect changes stage
    StageChange,
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Email => write!(f, "email"),
            Self::Meeting => write!(f, "meeting"),
            Self::Message => write!(f, "message"),
            Self::Proposal => write!(f, "proposal"),
            Self::Note => write!(f, "note"),
            Self::StageChange => write!(f, "stage_change"),
        }
    }
}

impl std::str::FromStr for InteractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "call" => Ok(Self::Call),
            "email" => Ok(Self::Email),
            "meeting" => Ok(Self::Meeting),
            "message" => Ok(Self::Message),
            "proposal" => Ok(Self::Proposal),
            "note" => Ok(Self::Note),
            "stage_change" => Ok(Self::StageChange),
            _ => Err(format!("Unknown interaction type: {}", s)),
        }
    }
}

/// One logged contact with a prospect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProspectInteraction {
    pub id: String,
    pub prospect_id: String,
    pub owner_id: String,
    pub kind: InteractionKind,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: Option<u32>,
    pub from_stage_id: Option<String>,
    pub to_stage_id: Option<String>,
    pub created_at: i64,
}

impl ProspectInteraction {
    pub fn new(owner_id: &str, input: NewInteraction) -> Self {
        // Stage pair is only meaningful for stage changes
        let (from_stage_id, to_stage_id) = if input.kind == InteractionKind::StageChange {
            (input.from_stage_id, input.to_stage_id)
        } else {
            (None, None)
        };
        Self {
            id: generate_id("interaction", &input.kind.to_string()),
            prospect_id: input.prospect_id,
            owner_id: owner_id.to_string(),
            kind: input.kind,
            title: input.title,
            description: input.description,
            duration_minutes: input.duration_minutes,
            from_stage_id,
            to_stage_id,
            created_at: now_ms(),
        }
    }
}

impl Record for ProspectInteraction {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "interactions"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("prospect_id".to_string(), IndexValue::String(self.prospect_id.clone()));
        fields.insert("owner_id".to_string(), IndexValue::String(self.owner_id.clone()));
        fields.insert("kind".to_string(), IndexValue::String(self.kind.to_string()));
        fields
    }
}

/// Input for logging an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInteraction {
    pub prospect_id: String,
    pub kind: InteractionKind,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: Option<u32>,
    pub from_stage_id: Option<String>,
    pub to_stage_id: Option<String>,
}

impl NewInteraction {
    pub fn new(prospect_id: impl Into<String>, kind: InteractionKind, title: impl Into<String>) -> Self {
        Self {
            prospect_id: prospect_id.into(),
            kind,
            title: title.into(),
            description: None,
            duration_minutes: None,
            from_stage_id: None,
            to_stage_id: None,
        }
    }

    /// Automatic record of a stage transition
    pub fn stage_change(prospect_id: &str, from: &str, to: &str, title: impl Into<String>) -> Self {
        let mut input = Self::new(prospect_id, InteractionKind::StageChange, title);
        input.from_stage_id = Some(from.to_string());
        input.to_stage_id = Some(to.to_string());
        input
    }
}

/// Sort interactions most-recent-first
pub fn newest_first(interactions: &mut [ProspectInteraction]) {
    interactions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}
