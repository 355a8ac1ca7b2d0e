//! Stage domain type
//!
//! A stage is one ordered column of a sales pipeline.

use rowstore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::generate_id;

/// One ordered column of a sales pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub color: String,
    /// Ordinal position, unique within the owner
    pub position: u32,
    /// Conversion probability, 0-100
    pub probability: u8,
    pub is_win_stage: bool,
    pub is_loss_stage: bool,
    pub is_default: bool,

    // Aggregates derived from the prospects referencing this stage
    #[serde(default)]
    pub prospect_count: u32,
    #[serde(default)]
    pub total_value: f64,
    #[serde(default)]
    pub weighted_value: f64,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Stage {
    /// Create a new stage with a generated ID
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>, position: u32, probability: u8) -> Self {
        let name = name.into();
        let now = now_ms();
        Self {
            id: generate_id("stage", &name),
            owner_id: owner_id.into(),
            name,
            color: DEFAULT_COLOR.to_string(),
            position,
            probability: probability.min(100),
            is_win_stage: false,
            is_loss_stage: false,
            is_default: false,
            prospect_count: 0,
            total_value: 0.0,
            weighted_value: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Win, loss and default stages cannot be deleted
    pub fn is_protected(&self) -> bool {
        self.is_win_stage || self.is_loss_stage || self.is_default
    }

    /// Recompute the weighted value from total value and probability
    pub fn refresh_weighted_value(&mut self) {
        self.weighted_value = self.total_value * f64::from(self.probability) / 100.0;
    }

    /// Add a prospect's value to the aggregates
    pub fn add_value(&mut self, value: f64) {
        self.prospect_count += 1;
        self.total_value += value;
        self.refresh_weighted_value();
    }

    /// Remove a prospect's value from the aggregates, floored at zero
    pub fn remove_value(&mut self, value: f64) {
        self.prospect_count = self.prospect_count.saturating_sub(1);
        self.total_value = (self.total_value - value).max(0.0);
        self.refresh_weighted_value();
    }

    /// Apply a patch to the editable fields
    pub fn apply(&mut self, patch: &StagePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(probability) = patch.probability {
            self.probability = probability.min(100);
            self.refresh_weighted_value();
        }
        self.updated_at = now_ms();
    }
}

impl Record for Stage {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "stages"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("owner_id".to_string(), IndexValue::String(self.owner_id.clone()));
        fields.insert("position".to_string(), IndexValue::Int(i64::from(self.position)));
        fields.insert("is_win_stage".to_string(), IndexValue::Bool(self.is_win_stage));
        fields.insert("is_loss_stage".to_string(), IndexValue::Bool(self.is_loss_stage));
        fields
    }
}

/// Default color for new stages
pub const DEFAULT_COLOR: &str = "#6366f1";

/// Editable stage fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagePatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub probability: Option<u8>,
}

/// Blueprint used when bootstrapping an owner's pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StageTemplate {
    pub name: String,
    pub color: String,
    pub probability: u8,
    #[serde(default)]
    pub is_win_stage: bool,
    #[serde(default)]
    pub is_loss_stage: bool,
    #[serde(default)]
    pub is_default: bool,
}

impl StageTemplate {
    fn new(name: &str, color: &str, probability: u8) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
            probability,
            is_win_stage: false,
            is_loss_stage: false,
            is_default: false,
        }
    }

    /// Materialize the template as a stage for an owner
    pub fn to_stage(&self, owner_id: &str, position: u32) -> Stage {
        let mut stage = Stage::new(owner_id, &self.name, position, self.probability);
        stage.color = self.color.clone();
        stage.is_win_stage = self.is_win_stage;
        stage.is_loss_stage = self.is_loss_stage;
        stage.is_default = self.is_default;
        stage
    }
}

/// The stock pipeline every new owner starts with
pub fn default_stage_templates() -> Vec<StageTemplate> {
    let mut lead = StageTemplate::new("Lead", "#94a3b8", 10);
    lead.is_default = true;
    let mut won = StageTemplate::new("Ganho", "#22c55e", 100);
    won.is_win_stage = true;
    let mut lost = StageTemplate::new("Perdido", "#ef4444", 0);
    lost.is_loss_stage = true;

    vec![
        lead,
        StageTemplate::new("Contato", "#3b82f6", 25),
        StageTemplate::new("Proposta", "#a855f7", 50),
        StageTemplate::new("Negociação", "#f59e0b", 75),
        won,
        lost,
    ]
}
