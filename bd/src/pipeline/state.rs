//! In-memory pipeline projection
//!
//! The flat prospect list is the single source of truth. `by_stage` is
//! regenerated from it by [`project`] after every mutation and is never
//! edited directly. All mutations here are synchronous; the board wraps them
//! with snapshots and remote calls.

use std::collections::{BTreeMap, HashMap};

use rowstore::now_ms;
use serde::Serialize;

use crate::domain::{PositionUpdate, Prospect, ProspectPatch, ProspectStatus, Stage, StagePatch};

use super::error::PipelineError;

/// Stages, prospects and the derived grouping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineState {
    /// Ordered by position
    pub stages: Vec<Stage>,
    pub prospects: Vec<Prospect>,
    /// Prospects per stage id, each bucket sorted by `position_in_stage`
    pub by_stage: BTreeMap<String, Vec<Prospect>>,
}

/// Group prospects by stage
///
/// Every stage gets a bucket, possibly empty. Prospects referencing an
/// unknown stage are left out of the grouping.
pub fn project(stages: &[Stage], prospects: &[Prospect]) -> BTreeMap<String, Vec<Prospect>> {
    let mut buckets: BTreeMap<String, Vec<Prospect>> = stages.iter().map(|s| (s.id.clone(), Vec::new())).collect();
    for prospect in prospects {
        if let Some(bucket) = buckets.get_mut(&prospect.stage_id) {
            bucket.push(prospect.clone());
        }
    }
    for bucket in buckets.values_mut() {
        bucket.sort_by_key(|p| p.position_in_stage);
    }
    buckets
}

/// Result of an applied move
#[derive(Debug, Clone, PartialEq)]
pub struct MovePlan {
    /// Every reindexed prospect in the source and destination buckets
    pub updates: Vec<PositionUpdate>,
    pub stage_changed: bool,
}

impl PipelineState {
    /// Build a state from fetched rows, deriving aggregates and grouping
    pub fn new(mut stages: Vec<Stage>, prospects: Vec<Prospect>) -> Self {
        stages.sort_by_key(|s| s.position);
        let mut state = Self {
            stages,
            prospects,
            by_stage: BTreeMap::new(),
        };
        state.recompute_aggregates();
        state.reproject();
        state
    }

    /// Regenerate the grouping from the flat list
    pub fn reproject(&mut self) {
        self.by_stage = project(&self.stages, &self.prospects);
    }

    /// Recompute every stage's count and values from the flat list
    pub fn recompute_aggregates(&mut self) {
        for stage in &mut self.stages {
            stage.prospect_count = 0;
            stage.total_value = 0.0;
            for prospect in self.prospects.iter().filter(|p| p.stage_id == stage.id) {
                stage.prospect_count += 1;
                stage.total_value += prospect.expected_value;
            }
            stage.refresh_weighted_value();
        }
    }

    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    fn stage_mut(&mut self, id: &str) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.id == id)
    }

    pub fn prospect(&self, id: &str) -> Option<&Prospect> {
        self.prospects.iter().find(|p| p.id == id)
    }

    /// Prospects in a stage, ordered by position
    pub fn bucket(&self, stage_id: &str) -> &[Prospect] {
        self.by_stage.get(stage_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn bucket_ids(&self, stage_id: &str) -> Vec<String> {
        self.bucket(stage_id).iter().map(|p| p.id.clone()).collect()
    }

    /// Move a prospect to `to_index` of the destination stage
    ///
    /// `to_index` refers to the destination bucket after removal from the
    /// source and is clamped to its length. Returns `None` for a same-stage
    /// drop at the current index, leaving the state untouched.
    pub fn apply_move(
        &mut self,
        id: &str,
        from_stage: &str,
        to_stage: &str,
        to_index: usize,
    ) -> Result<Option<MovePlan>, PipelineError> {
        let mut source = self.bucket_ids(from_stage);
        let src_index = source
            .iter()
            .position(|pid| pid == id)
            .ok_or_else(|| PipelineError::NotFound(format!("prospect {} in stage {}", id, from_stage)))?;
        if self.stage(to_stage).is_none() {
            return Err(PipelineError::NotFound(format!("stage {}", to_stage)));
        }

        let stage_changed = from_stage != to_stage;
        source.remove(src_index);
        let mut destination = if stage_changed {
            self.bucket_ids(to_stage)
        } else {
            source.clone()
        };
        let index = to_index.min(destination.len());
        if !stage_changed && index == src_index {
            return Ok(None);
        }
        destination.insert(index, id.to_string());

        let mut placement: HashMap<String, (String, u32)> = HashMap::new();
        for (pos, pid) in destination.iter().enumerate() {
            placement.insert(pid.clone(), (to_stage.to_string(), pos as u32));
        }
        if stage_changed {
            for (pos, pid) in source.iter().enumerate() {
                placement.insert(pid.clone(), (from_stage.to_string(), pos as u32));
            }
        }

        let now = now_ms();
        let mut moved_value = 0.0;
        let mut updates = Vec::with_capacity(placement.len());
        for prospect in &mut self.prospects {
            let Some((stage_id, pos)) = placement.get(&prospect.id) else {
                continue;
            };
            prospect.position_in_stage = *pos;
            let mut entered_stage_at = None;
            if prospect.id == id {
                moved_value = prospect.expected_value;
                prospect.updated_at = now;
                if stage_changed {
                    prospect.stage_id = stage_id.clone();
                    prospect.entered_stage_at = now;
                    entered_stage_at = Some(now);
                }
            }
            updates.push(PositionUpdate {
                id: prospect.id.clone(),
                stage_id: stage_id.clone(),
                position_in_stage: *pos,
                entered_stage_at,
            });
        }

        if stage_changed {
            if let Some(stage) = self.stage_mut(from_stage) {
                stage.remove_value(moved_value);
            }
            if let Some(stage) = self.stage_mut(to_stage) {
                stage.add_value(moved_value);
            }
        }
        self.reproject();

        Ok(Some(MovePlan { updates, stage_changed }))
    }

    /// Append a new prospect at the end of its stage
    pub fn apply_create(&mut self, mut draft: Prospect) -> Result<Prospect, PipelineError> {
        if self.stage(&draft.stage_id).is_none() {
            return Err(PipelineError::NotFound(format!("stage {}", draft.stage_id)));
        }
        draft.position_in_stage = self.bucket(&draft.stage_id).len() as u32;
        if let Some(stage) = self.stage_mut(&draft.stage_id) {
            stage.add_value(draft.expected_value);
        }
        self.prospects.push(draft.clone());
        self.reproject();
        Ok(draft)
    }

    /// Replace a prospect by id with its canonical version
    ///
    /// Returns false when the prospect is no longer present.
    pub fn replace_prospect(&mut self, id: &str, canonical: Prospect) -> bool {
        let Some(slot) = self.prospects.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        *slot = canonical;
        self.reproject();
        true
    }

    /// Merge a patch into a prospect, adjusting its stage's value total
    pub fn apply_update(&mut self, id: &str, patch: &ProspectPatch) -> Result<(), PipelineError> {
        let prospect = self
            .prospects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| PipelineError::NotFound(format!("prospect {}", id)))?;

        let delta = patch.expected_value.map(|v| v - prospect.expected_value);
        let stage_id = prospect.stage_id.clone();
        prospect.apply(patch);

        if let Some(delta) = delta
            && let Some(stage) = self.stage_mut(&stage_id)
        {
            stage.total_value = (stage.total_value + delta).max(0.0);
            stage.refresh_weighted_value();
        }
        self.reproject();
        Ok(())
    }

    /// Remove a prospect and close the gap it leaves in its stage
    pub fn apply_delete(&mut self, id: &str) -> Result<Prospect, PipelineError> {
        let index = self
            .prospects
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PipelineError::NotFound(format!("prospect {}", id)))?;
        let removed = self.prospects.remove(index);

        let remaining: Vec<String> = self
            .bucket(&removed.stage_id)
            .iter()
            .filter(|p| p.id != removed.id)
            .map(|p| p.id.clone())
            .collect();
        for prospect in &mut self.prospects {
            if let Some(pos) = remaining.iter().position(|pid| *pid == prospect.id) {
                prospect.position_in_stage = pos as u32;
            }
        }

        if let Some(stage) = self.stage_mut(&removed.stage_id) {
            stage.remove_value(removed.expected_value);
        }
        self.reproject();
        Ok(removed)
    }

    /// Append a new stage after the existing ones
    pub fn apply_stage_insert(&mut self, mut draft: Stage) -> Stage {
        draft.position = self.stages.len() as u32;
        self.stages.push(draft.clone());
        self.reproject();
        draft
    }

    /// Swap a placeholder stage for its canonical version, keeping local aggregates
    pub fn replace_stage(&mut self, id: &str, mut canonical: Stage) -> bool {
        let Some(slot) = self.stages.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        canonical.prospect_count = slot.prospect_count;
        canonical.total_value = slot.total_value;
        canonical.refresh_weighted_value();
        *slot = canonical;
        self.reproject();
        true
    }

    pub fn apply_stage_update(&mut self, id: &str, patch: &StagePatch) -> Result<(), PipelineError> {
        let stage = self
            .stage_mut(id)
            .ok_or_else(|| PipelineError::NotFound(format!("stage {}", id)))?;
        stage.apply(patch);
        Ok(())
    }

    /// Reorder stages; `ordered_ids` must be a permutation of the current ids
    pub fn apply_stage_reorder(&mut self, ordered_ids: &[String]) -> Result<(), PipelineError> {
        let mut current: Vec<&str> = self.stages.iter().map(|s| s.id.as_str()).collect();
        let mut requested: Vec<&str> = ordered_ids.iter().map(String::as_str).collect();
        current.sort_unstable();
        requested.sort_unstable();
        if current != requested {
            return Err(PipelineError::Validation(
                "stage order must list every stage exactly once".to_string(),
            ));
        }

        let mut reordered = Vec::with_capacity(self.stages.len());
        for (pos, id) in ordered_ids.iter().enumerate() {
            if let Some(index) = self.stages.iter().position(|s| &s.id == id) {
                let mut stage = self.stages.remove(index);
                stage.position = pos as u32;
                reordered.push(stage);
            }
        }
        self.stages = reordered;
        Ok(())
    }

    /// Remove a stage after checking the deletion rules
    pub fn apply_stage_delete(&mut self, id: &str) -> Result<Stage, PipelineError> {
        let stage = self
            .stage(id)
            .ok_or_else(|| PipelineError::NotFound(format!("stage {}", id)))?;
        if stage.prospect_count > 0 || !self.bucket(id).is_empty() {
            return Err(PipelineError::StageNotEmpty(stage.name.clone()));
        }
        if stage.is_protected() {
            return Err(PipelineError::ProtectedStage(stage.name.clone()));
        }

        let index = self.stages.iter().position(|s| s.id == id).unwrap_or_default();
        let removed = self.stages.remove(index);
        for (pos, stage) in self.stages.iter_mut().enumerate() {
            stage.position = pos as u32;
        }
        self.reproject();
        Ok(removed)
    }

    pub fn set_last_interaction(&mut self, prospect_id: &str, at: i64) {
        if let Some(prospect) = self.prospects.iter_mut().find(|p| p.id == prospect_id) {
            prospect.last_interaction_at = Some(at);
            self.reproject();
        }
    }
}

/// Summary numbers for the board header and exports
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineMetrics {
    pub total_prospects: usize,
    pub open_prospects: usize,
    pub won_prospects: usize,
    pub lost_prospects: usize,
    /// Expected value of open prospects
    pub open_value: f64,
    /// Sum of stage weighted values
    pub weighted_value: f64,
    pub won_value: f64,
    /// Won share of closed prospects, one decimal place
    pub conversion_rate: f64,
}

impl PipelineMetrics {
    pub fn from_state(state: &PipelineState) -> Self {
        let mut metrics = Self {
            total_prospects: state.prospects.len(),
            weighted_value: state.stages.iter().map(|s| s.weighted_value).sum(),
            ..Default::default()
        };
        for prospect in &state.prospects {
            match prospect.status {
                ProspectStatus::Open => {
                    metrics.open_prospects += 1;
                    metrics.open_value += prospect.expected_value;
                }
                ProspectStatus::Won => {
                    metrics.won_prospects += 1;
                    metrics.won_value += prospect.expected_value;
                }
                ProspectStatus::Lost => metrics.lost_prospects += 1,
            }
        }
        let closed = metrics.won_prospects + metrics.lost_prospects;
        if closed > 0 {
            metrics.conversion_rate = (metrics.won_prospects as f64 / closed as f64 * 1000.0).round() / 10.0;
        }
        metrics
    }
}
