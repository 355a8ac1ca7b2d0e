//! Persistence collaborator for the pipeline board

use async_trait::async_trait;

use crate::domain::{
    Client, NewInteraction, PositionUpdate, Prospect, ProspectInteraction, ProspectPatch, ProspectQuery, Stage,
    StagePatch, StageTemplate,
};
use crate::state::StateResponse;

/// Row-oriented remote the board issues its calls against
///
/// Every call is scoped to a single owner by the implementation.
#[async_trait]
pub trait PipelineRemote: Send + Sync {
    /// All stages, ordered by position
    async fn fetch_stages(&self) -> StateResponse<Vec<Stage>>;

    async fn fetch_prospects(&self, query: &ProspectQuery) -> StateResponse<Vec<Prospect>>;

    /// Persist a client-built stage, returning the canonical record
    async fn insert_stage(&self, draft: Stage) -> StateResponse<Stage>;

    async fn update_stage(&self, id: &str, patch: &StagePatch) -> StateResponse<()>;

    /// Assign positions `0..n` following the given order
    async fn reorder_stages(&self, ordered_ids: &[String]) -> StateResponse<()>;

    async fn delete_stage(&self, id: &str) -> StateResponse<()>;

    /// Create any missing template stages; returns how many were created
    async fn ensure_default_stages(&self, templates: &[StageTemplate]) -> StateResponse<usize>;

    /// Persist a client-built prospect, returning the canonical record
    async fn insert_prospect(&self, draft: Prospect) -> StateResponse<Prospect>;

    async fn update_prospect(&self, id: &str, patch: &ProspectPatch) -> StateResponse<Prospect>;

    async fn delete_prospect(&self, id: &str) -> StateResponse<()>;

    /// Bulk position update, applied atomically
    async fn reorder_prospects(&self, updates: &[PositionUpdate]) -> StateResponse<()>;

    async fn mark_won(&self, id: &str) -> StateResponse<()>;

    async fn mark_lost(&self, id: &str, reason: Option<&str>) -> StateResponse<()>;

    async fn convert_to_client(&self, id: &str) -> StateResponse<Client>;

    async fn log_interaction(&self, input: NewInteraction) -> StateResponse<ProspectInteraction>;

    async fn interactions(&self, prospect_id: &str) -> StateResponse<Vec<ProspectInteraction>>;
}
