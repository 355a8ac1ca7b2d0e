//! Prospect domain type
//!
//! A prospect is a sales lead shown as a card inside a pipeline stage.

use chrono::NaiveDate;
use rowstore::{Filter, FilterOp, IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::temp_id;
use super::priority::Priority;

/// Prospect lifecycle status
///
/// `Won` and `Lost` are terminal; nothing transitions back to `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProspectStatus {
    #[default]
    Open,
    Won,
    Lost,
}

impl ProspectStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl std::fmt::Display for ProspectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Won => write!(f, "won"),
            Self::Lost => write!(f, "lost"),
        }
    }
}

impl std::str::FromStr for ProspectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            _ => Err(format!("Unknown prospect status: {}", s)),
        }
    }
}

/// A sales lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prospect {
    pub id: String,
    pub owner_id: String,
    pub stage_id: String,
    /// Zero-based, contiguous within the stage at rest
    pub position_in_stage: u32,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub expected_value: f64,
    pub expected_close_date: Option<NaiveDate>,
    pub priority: Priority,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub status: ProspectStatus,
    pub converted_client_id: Option<String>,
    pub converted_at: Option<i64>,
    #[serde(default)]
    pub lost_reason: Option<String>,
    pub entered_stage_at: i64,
    pub last_interaction_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Prospect {
    /// Build a client-side placeholder from creation input
    pub fn draft(owner_id: &str, input: &NewProspect, position_in_stage: u32) -> Self {
        let now = now_ms();
        Self {
            id: temp_id(),
            owner_id: owner_id.to_string(),
            stage_id: input.stage_id.clone(),
            position_in_stage,
            name: input.name.trim().to_string(),
            company: input.company.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            expected_value: input.expected_value,
            expected_close_date: input.expected_close_date,
            priority: input.priority,
            source: input.source.clone(),
            notes: input.notes.clone(),
            status: ProspectStatus::Open,
            converted_client_id: None,
            converted_at: None,
            lost_reason: None,
            entered_stage_at: now,
            last_interaction_at: None,
            created_at: now,
            updated_at: now,
            tags: input.tags.clone(),
        }
    }

    /// Merge a patch into this prospect
    pub fn apply(&mut self, patch: &ProspectPatch) {
        if let Some(name) = &patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(company) = &patch.company {
            self.company = Some(company.clone());
        }
        if let Some(email) = &patch.email {
            self.email = Some(email.clone());
        }
        if let Some(phone) = &patch.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(value) = patch.expected_value {
            self.expected_value = value;
        }
        if let Some(date) = patch.expected_close_date {
            self.expected_close_date = Some(date);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(source) = &patch.source {
            self.source = Some(source.clone());
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        self.updated_at = now_ms();
    }
}

impl Record for Prospect {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "prospects"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("owner_id".to_string(), IndexValue::String(self.owner_id.clone()));
        fields.insert("stage_id".to_string(), IndexValue::String(self.stage_id.clone()));
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("priority".to_string(), IndexValue::String(self.priority.to_string()));
        fields.insert("value_cents".to_string(), IndexValue::Int(to_cents(self.expected_value)));
        fields
    }
}

fn to_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Input for creating a prospect
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProspect {
    pub stage_id: String,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub expected_value: f64,
    pub expected_close_date: Option<NaiveDate>,
    pub priority: Priority,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

impl NewProspect {
    pub fn new(stage_id: impl Into<String>, name: impl Into<String>, expected_value: f64) -> Self {
        Self {
            stage_id: stage_id.into(),
            name: name.into(),
            expected_value,
            ..Default::default()
        }
    }
}

/// Editable prospect fields
///
/// Stage is not editable here; stage changes go through a move so bucket
/// membership and positions stay consistent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProspectPatch {
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub expected_value: Option<f64>,
    pub expected_close_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// New position of a prospect after a move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub id: String,
    pub stage_id: String,
    pub position_in_stage: u32,
    /// Set only for the prospect whose stage changed
    pub entered_stage_at: Option<i64>,
}

/// Filters for fetching prospects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProspectQuery {
    pub status: Option<ProspectStatus>,
    pub priority: Option<Priority>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    /// Case-insensitive match on name, company or email
    pub search: Option<String>,
    /// Restrict to these stages; empty means all
    pub stage_ids: Vec<String>,
}

impl ProspectQuery {
    /// Filters the store can evaluate on its index
    pub fn index_filters(&self, owner_id: &str) -> Vec<Filter> {
        let mut filters = vec![Filter::eq("owner_id", owner_id)];
        if let Some(status) = self.status {
            filters.push(Filter::eq("status", status.to_string()));
        }
        if let Some(priority) = self.priority {
            filters.push(Filter::eq("priority", priority.to_string()));
        }
        if let Some(min) = self.min_value {
            filters.push(Filter {
                field: "value_cents".to_string(),
                op: FilterOp::Gte,
                value: IndexValue::Int(to_cents(min)),
            });
        }
        if let Some(max) = self.max_value {
            filters.push(Filter {
                field: "value_cents".to_string(),
                op: FilterOp::Lte,
                value: IndexValue::Int(to_cents(max)),
            });
        }
        if let [only] = self.stage_ids.as_slice() {
            filters.push(Filter::eq("stage_id", only.as_str()));
        }
        filters
    }

    /// Full predicate, including the parts the index cannot express
    pub fn matches(&self, prospect: &Prospect) -> bool {
        if self.status.is_some_and(|s| s != prospect.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != prospect.priority) {
            return false;
        }
        if self.min_value.is_some_and(|min| prospect.expected_value < min) {
            return false;
        }
        if self.max_value.is_some_and(|max| prospect.expected_value > max) {
            return false;
        }
        if !self.stage_ids.is_empty() && !self.stage_ids.contains(&prospect.stage_id) {
            return false;
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = [Some(&prospect.name), prospect.company.as_ref(), prospect.email.as_ref()]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Prospect {
        let mut input = NewProspect::new("s1", "Acme Corp", 5000.0);
        input.company = Some("Acme Holdings".to_string());
        input.email = Some("buyer@acme.test".to_string());
        input.priority = Priority::High;
        Prospect::draft("u1", &input, 0)
    }

    #[test]
    fn test_draft_is_open_with_temp_id() {
        let p = sample();
        assert!(super::super::id::is_temp_id(&p.id));
        assert_eq!(p.status, ProspectStatus::Open);
        assert_eq!(p.entered_stage_at, p.created_at);
    }

    #[test]
    fn test_apply_patch() {
        let mut p = sample();
        p.apply(&ProspectPatch {
            name: Some("  Acme Inc ".to_string()),
            expected_value: Some(7500.0),
            ..Default::default()
        });
        assert_eq!(p.name, "Acme Inc");
        assert_eq!(p.expected_value, 7500.0);
        assert_eq!(p.stage_id, "s1");
    }

    #[test]
    fn test_query_matches() {
        let p = sample();
        assert!(ProspectQuery::default().matches(&p));

        let by_search = ProspectQuery {
            search: Some("HOLDINGS".to_string()),
            ..Default::default()
        };
        assert!(by_search.matches(&p));

        let by_range = ProspectQuery {
            min_value: Some(6000.0),
            ..Default::default()
        };
        assert!(!by_range.matches(&p));

        let by_stage = ProspectQuery {
            stage_ids: vec!["s2".to_string()],
            ..Default::default()
        };
        assert!(!by_stage.matches(&p));

        let by_status = ProspectQuery {
            status: Some(ProspectStatus::Won),
            ..Default::default()
        };
        assert!(!by_status.matches(&p));
    }

    #[test]
    fn test_index_filters() {
        let query = ProspectQuery {
            status: Some(ProspectStatus::Open),
            min_value: Some(10.5),
            stage_ids: vec!["s1".to_string()],
            ..Default::default()
        };
        let filters = query.index_filters("u1");
        assert_eq!(filters.len(), 4);
        assert!(filters.iter().any(|f| f.field == "value_cents" && f.value == IndexValue::Int(1050)));
    }

    #[test]
    fn test_status_terminal() {
        assert!(!ProspectStatus::Open.is_terminal());
        assert!(ProspectStatus::Won.is_terminal());
        assert!(ProspectStatus::Lost.is_terminal());
    }
}
