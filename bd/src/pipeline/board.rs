//! PipelineBoard - optimistic state container for the sales pipeline
//!
//! Optimistic operations apply to the local projection first, then call the
//! remote. A failed remote call restores the snapshot taken before the
//! mutation. Won, lost and convert are remote-authoritative: the board calls
//! the remote and then reloads everything.
//!
//! The state lock is never held across a remote call, so a second operation
//! can start while the first is pending. Overlapping operations on the same
//! prospect race; whichever remote call resolves last decides the outcome.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::domain::{
    Client, NewInteraction, NewProspect, Prospect, ProspectInteraction, ProspectPatch, ProspectQuery, ProspectStatus,
    Stage, StagePatch, StageTemplate, default_stage_templates, is_temp_id, newest_first, temp_id,
};

use super::error::PipelineError;
use super::remote::PipelineRemote;
use super::state::{PipelineMetrics, PipelineState};

/// Change notifications for subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    /// Full state replaced from the remote
    Loaded,
    /// An optimistic change was applied or reconciled
    Changed { operation: &'static str },
    /// A failed remote call restored the pre-operation state
    RolledBack { operation: &'static str },
    Failed { message: String },
}

struct BoardInner {
    state: PipelineState,
    loading: bool,
    last_error: Option<String>,
    query: ProspectQuery,
}

/// Client-held projection of one owner's pipeline
pub struct PipelineBoard<R: PipelineRemote> {
    remote: Arc<R>,
    owner_id: String,
    templates: Vec<StageTemplate>,
    inner: Mutex<BoardInner>,
    event_tx: broadcast::Sender<BoardEvent>,
}

impl<R: PipelineRemote> PipelineBoard<R> {
    pub fn new(remote: Arc<R>, owner_id: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            remote,
            owner_id: owner_id.into(),
            templates: default_stage_templates(),
            inner: Mutex::new(BoardInner {
                state: PipelineState::default(),
                loading: false,
                last_error: None,
                query: ProspectQuery::default(),
            }),
            event_tx,
        }
    }

    /// Use a custom stage blueprint for `ensure_default_stages`
    pub fn with_templates(mut self, templates: Vec<StageTemplate>) -> Self {
        self.templates = templates;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: BoardEvent) {
        let _ = self.event_tx.send(event);
    }

    // === Selectors ===

    pub async fn snapshot(&self) -> PipelineState {
        self.inner.lock().await.state.clone()
    }

    pub async fn stage_prospects(&self, stage_id: &str) -> Vec<Prospect> {
        self.inner.lock().await.state.bucket(stage_id).to_vec()
    }

    pub async fn metrics(&self) -> PipelineMetrics {
        PipelineMetrics::from_state(&self.inner.lock().await.state)
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.lock().await.last_error.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.lock().await.loading
    }

    // === Bookkeeping ===

    async fn begin(&self, loading: bool) {
        let mut inner = self.inner.lock().await;
        inner.last_error = None;
        inner.loading = loading;
    }

    /// Record a failure, clear the loading flag and hand the error back
    async fn fail(&self, operation: &'static str, err: PipelineError) -> PipelineError {
        warn!(operation, error = %err, "Pipeline operation failed");
        {
            let mut inner = self.inner.lock().await;
            inner.last_error = Some(err.to_string());
            inner.loading = false;
        }
        self.emit(BoardEvent::Failed {
            message: err.to_string(),
        });
        err
    }

    /// Restore the pre-operation snapshot, then record the failure
    async fn rollback(&self, operation: &'static str, snapshot: PipelineState, err: PipelineError) -> PipelineError {
        debug!(operation, "rollback: restoring snapshot");
        self.inner.lock().await.state = snapshot;
        self.emit(BoardEvent::RolledBack { operation });
        self.fail(operation, err).await
    }

    /// Apply a synchronous mutation under the lock, returning the pre-image
    async fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut PipelineState) -> Result<T, PipelineError>,
    ) -> Result<(PipelineState, T), PipelineError> {
        let mut inner = self.inner.lock().await;
        let snapshot = inner.state.clone();
        let out = apply(&mut inner.state)?;
        Ok((snapshot, out))
    }

    // === Loading ===

    /// Fetch stages and prospects matching `query`, replacing the state
    pub async fn load(&self, query: ProspectQuery) -> Result<(), PipelineError> {
        debug!(?query, "load: called");
        self.begin(true).await;
        self.inner.lock().await.query = query.clone();

        let fetched = async {
            let stages = self.remote.fetch_stages().await?;
            let prospects = self.remote.fetch_prospects(&query).await?;
            Ok::<_, PipelineError>((stages, prospects))
        }
        .await;

        match fetched {
            Ok((stages, prospects)) => {
                let state = PipelineState::new(stages, prospects);
                info!(
                    stages = state.stages.len(),
                    prospects = state.prospects.len(),
                    "Pipeline loaded"
                );
                let mut inner = self.inner.lock().await;
                inner.state = state;
                inner.loading = false;
                drop(inner);
                self.emit(BoardEvent::Loaded);
                Ok(())
            }
            Err(err) => Err(self.fail("load", err).await),
        }
    }

    /// Reload with the last query
    pub async fn reload(&self) -> Result<(), PipelineError> {
        let query = self.inner.lock().await.query.clone();
        self.load(query).await
    }

    // === Prospects ===

    /// Move a prospect within or across stages
    ///
    /// Returns false when the drop was a no-op and nothing was sent.
    pub async fn move_prospect(
        &self,
        id: &str,
        from_stage: &str,
        to_stage: &str,
        to_index: usize,
    ) -> Result<bool, PipelineError> {
        debug!(%id, %from_stage, %to_stage, to_index, "move_prospect: called");
        self.begin(false).await;
        if is_temp_id(id) {
            return Err(self.fail("move", PipelineError::Pending(id.to_string())).await);
        }

        let (snapshot, plan) = match self
            .mutate(|state| state.apply_move(id, from_stage, to_stage, to_index))
            .await
        {
            Ok((_, None)) => {
                debug!(%id, "move_prospect: no-op drop");
                return Ok(false);
            }
            Ok((snapshot, Some(plan))) => (snapshot, plan),
            Err(err) => return Err(self.fail("move", err).await),
        };
        self.emit(BoardEvent::Changed { operation: "move" });

        if let Err(err) = self.remote.reorder_prospects(&plan.updates).await {
            return Err(self.rollback("move", snapshot, err.into()).await);
        }

        if plan.stage_changed {
            let title = {
                let name = |sid: &str| snapshot.stage(sid).map(|s| s.name.clone()).unwrap_or_else(|| sid.to_string());
                format!("Movido de {} para {}", name(from_stage), name(to_stage))
            };
            let input = NewInteraction::stage_change(id, from_stage, to_stage, title);
            match self.remote.log_interaction(input).await {
                Ok(entry) => self.inner.lock().await.state.set_last_interaction(id, entry.created_at),
                Err(err) => warn!(%id, error = %err, "Failed to log stage change"),
            }
        }
        Ok(true)
    }

    /// Create a prospect at the end of its stage
    pub async fn create_prospect(&self, input: NewProspect) -> Result<Prospect, PipelineError> {
        debug!(stage_id = %input.stage_id, name = %input.name, "create_prospect: called");
        self.begin(false).await;
        if let Err(err) = validate_new_prospect(&input) {
            return Err(self.fail("create", err).await);
        }

        let draft = Prospect::draft(&self.owner_id, &input, 0);
        let temp = draft.id.clone();
        let (snapshot, draft) = match self.mutate(|state| state.apply_create(draft)).await {
            Ok(applied) => applied,
            Err(err) => return Err(self.fail("create", err).await),
        };
        self.emit(BoardEvent::Changed { operation: "create" });

        match self.remote.insert_prospect(draft).await {
            Ok(canonical) => {
                self.inner
                    .lock()
                    .await
                    .state
                    .replace_prospect(&temp, canonical.clone());
                self.emit(BoardEvent::Changed { operation: "create" });
                info!(id = %canonical.id, "Prospect created");
                Ok(canonical)
            }
            Err(err) => Err(self.rollback("create", snapshot, err.into()).await),
        }
    }

    /// Edit a prospect's fields; stage changes go through `move_prospect`
    pub async fn update_prospect(&self, id: &str, patch: ProspectPatch) -> Result<Prospect, PipelineError> {
        debug!(%id, ?patch, "update_prospect: called");
        self.begin(false).await;
        if is_temp_id(id) {
            return Err(self.fail("update", PipelineError::Pending(id.to_string())).await);
        }
        if let Err(err) = validate_patch(&patch) {
            return Err(self.fail("update", err).await);
        }

        let (snapshot, ()) = match self.mutate(|state| state.apply_update(id, &patch)).await {
            Ok(applied) => applied,
            Err(err) => return Err(self.fail("update", err).await),
        };
        self.emit(BoardEvent::Changed { operation: "update" });

        match self.remote.update_prospect(id, &patch).await {
            Ok(canonical) => {
                self.inner.lock().await.state.replace_prospect(id, canonical.clone());
                Ok(canonical)
            }
            Err(err) => Err(self.rollback("update", snapshot, err.into()).await),
        }
    }

    pub async fn delete_prospect(&self, id: &str) -> Result<(), PipelineError> {
        debug!(%id, "delete_prospect: called");
        self.begin(false).await;
        if is_temp_id(id) {
            return Err(self.fail("delete", PipelineError::Pending(id.to_string())).await);
        }

        let (snapshot, _removed) = match self.mutate(|state| state.apply_delete(id)).await {
            Ok(applied) => applied,
            Err(err) => return Err(self.fail("delete", err).await),
        };
        self.emit(BoardEvent::Changed { operation: "delete" });

        if let Err(err) = self.remote.delete_prospect(id).await {
            return Err(self.rollback("delete", snapshot, err.into()).await);
        }
        Ok(())
    }

    /// Check a status transition against the local copy before calling out
    async fn require_open(&self, id: &str) -> Result<Prospect, PipelineError> {
        let inner = self.inner.lock().await;
        let prospect = inner
            .state
            .prospect(id)
            .ok_or_else(|| PipelineError::NotFound(format!("prospect {}", id)))?;
        if prospect.status.is_terminal() {
            return Err(PipelineError::InvalidTransition(format!(
                "prospect {} is already {}",
                id, prospect.status
            )));
        }
        Ok(prospect.clone())
    }

    /// Run a remote-authoritative call, then reload from the remote
    async fn authoritative<T>(
        &self,
        operation: &'static str,
        result: Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        match result {
            Ok(value) => {
                self.reload().await?;
                Ok(value)
            }
            Err(err) => Err(self.fail(operation, err).await),
        }
    }

    pub async fn mark_won(&self, id: &str) -> Result<(), PipelineError> {
        debug!(%id, "mark_won: called");
        self.begin(true).await;
        let result = match self.require_open(id).await {
            Ok(_) => self.remote.mark_won(id).await.map_err(PipelineError::from),
            Err(err) => Err(err),
        };
        self.authoritative("mark_won", result).await
    }

    pub async fn mark_lost(&self, id: &str, reason: Option<&str>) -> Result<(), PipelineError> {
        debug!(%id, ?reason, "mark_lost: called");
        self.begin(true).await;
        let result = match self.require_open(id).await {
            Ok(_) => self.remote.mark_lost(id, reason).await.map_err(PipelineError::from),
            Err(err) => Err(err),
        };
        self.authoritative("mark_lost", result).await
    }

    /// Convert a prospect into a client record
    pub async fn convert_to_client(&self, id: &str) -> Result<Client, PipelineError> {
        debug!(%id, "convert_to_client: called");
        self.begin(true).await;
        let checked = {
            let inner = self.inner.lock().await;
            match inner.state.prospect(id) {
                None => Err(PipelineError::NotFound(format!("prospect {}", id))),
                Some(p) if p.converted_client_id.is_some() => Err(PipelineError::InvalidTransition(format!(
                    "prospect {} is already converted",
                    id
                ))),
                Some(p) if p.status == ProspectStatus::Lost => Err(PipelineError::InvalidTransition(format!(
                    "prospect {} is lost",
                    id
                ))),
                Some(_) => Ok(()),
            }
        };
        let result = match checked {
            Ok(()) => self.remote.convert_to_client(id).await.map_err(PipelineError::from),
            Err(err) => Err(err),
        };
        self.authoritative("convert", result).await
    }

    // === Interactions ===

    pub async fn log_interaction(&self, input: NewInteraction) -> Result<ProspectInteraction, PipelineError> {
        debug!(prospect_id = %input.prospect_id, kind = %input.kind, "log_interaction: called");
        self.begin(false).await;
        if input.title.trim().is_empty() {
            return Err(self
                .fail("log_interaction", PipelineError::Validation("title is required".to_string()))
                .await);
        }
        let prospect_id = input.prospect_id.clone();
        match self.remote.log_interaction(input).await {
            Ok(entry) => {
                self.inner
                    .lock()
                    .await
                    .state
                    .set_last_interaction(&prospect_id, entry.created_at);
                Ok(entry)
            }
            Err(err) => Err(self.fail("log_interaction", err.into()).await),
        }
    }

    /// Interactions for a prospect, most recent first
    pub async fn interactions(&self, prospect_id: &str) -> Result<Vec<ProspectInteraction>, PipelineError> {
        debug!(%prospect_id, "interactions: called");
        match self.remote.interactions(prospect_id).await {
            Ok(mut entries) => {
                newest_first(&mut entries);
                Ok(entries)
            }
            Err(err) => Err(self.fail("interactions", err.into()).await),
        }
    }

    // === Stages ===

    pub async fn create_stage(&self, name: &str, color: Option<&str>, probability: u8) -> Result<Stage, PipelineError> {
        debug!(%name, ?color, probability, "create_stage: called");
        self.begin(false).await;
        let name = name.trim();
        if name.is_empty() {
            return Err(self
                .fail("create_stage", PipelineError::Validation("stage name is required".to_string()))
                .await);
        }

        let mut draft = Stage::new(self.owner_id.as_str(), name, 0, probability);
        draft.id = temp_id();
        if let Some(color) = color {
            draft.color = color.to_string();
        }
        let temp = draft.id.clone();
        let (snapshot, draft) = match self.mutate(|state| Ok(state.apply_stage_insert(draft))).await {
            Ok(applied) => applied,
            Err(err) => return Err(self.fail("create_stage", err).await),
        };
        self.emit(BoardEvent::Changed {
            operation: "create_stage",
        });

        match self.remote.insert_stage(draft).await {
            Ok(canonical) => {
                self.inner.lock().await.state.replace_stage(&temp, canonical.clone());
                Ok(canonical)
            }
            Err(err) => Err(self.rollback("create_stage", snapshot, err.into()).await),
        }
    }

    pub async fn update_stage(&self, id: &str, patch: StagePatch) -> Result<(), PipelineError> {
        debug!(%id, ?patch, "update_stage: called");
        self.begin(false).await;
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(self
                .fail("update_stage", PipelineError::Validation("stage name is required".to_string()))
                .await);
        }

        let (snapshot, ()) = match self.mutate(|state| state.apply_stage_update(id, &patch)).await {
            Ok(applied) => applied,
            Err(err) => return Err(self.fail("update_stage", err).await),
        };
        self.emit(BoardEvent::Changed {
            operation: "update_stage",
        });

        if let Err(err) = self.remote.update_stage(id, &patch).await {
            return Err(self.rollback("update_stage", snapshot, err.into()).await);
        }
        Ok(())
    }

    pub async fn reorder_stages(&self, ordered_ids: Vec<String>) -> Result<(), PipelineError> {
        debug!(?ordered_ids, "reorder_stages: called");
        self.begin(false).await;
        let (snapshot, ()) = match self.mutate(|state| state.apply_stage_reorder(&ordered_ids)).await {
            Ok(applied) => applied,
            Err(err) => return Err(self.fail("reorder_stages", err).await),
        };
        self.emit(BoardEvent::Changed {
            operation: "reorder_stages",
        });

        if let Err(err) = self.remote.reorder_stages(&ordered_ids).await {
            return Err(self.rollback("reorder_stages", snapshot, err.into()).await);
        }
        Ok(())
    }

    /// Delete an empty, unprotected stage
    pub async fn delete_stage(&self, id: &str) -> Result<(), PipelineError> {
        debug!(%id, "delete_stage: called");
        self.begin(false).await;
        let (snapshot, _removed) = match self.mutate(|state| state.apply_stage_delete(id)).await {
            Ok(applied) => applied,
            Err(err) => return Err(self.fail("delete_stage", err).await),
        };
        self.emit(BoardEvent::Changed {
            operation: "delete_stage",
        });

        if let Err(err) = self.remote.delete_stage(id).await {
            return Err(self.rollback("delete_stage", snapshot, err.into()).await);
        }
        Ok(())
    }

    /// Create any missing template stages, then reload
    pub async fn ensure_default_stages(&self) -> Result<usize, PipelineError> {
        debug!(template_count = self.templates.len(), "ensure_default_stages: called");
        self.begin(true).await;
        let result = self
            .remote
            .ensure_default_stages(&self.templates)
            .await
            .map_err(PipelineError::from);
        self.authoritative("ensure_default_stages", result).await
    }
}

fn validate_new_prospect(input: &NewProspect) -> Result<(), PipelineError> {
    if input.name.trim().is_empty() {
        return Err(PipelineError::Validation("prospect name is required".to_string()));
    }
    if input.stage_id.is_empty() {
        return Err(PipelineError::Validation("stage is required".to_string()));
    }
    validate_value(input.expected_value)
}

fn validate_patch(patch: &ProspectPatch) -> Result<(), PipelineError> {
    if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(PipelineError::Validation("prospect name is required".to_string()));
    }
    match patch.expected_value {
        Some(value) => validate_value(value),
        None => Ok(()),
    }
}

fn validate_value(value: f64) -> Result<(), PipelineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(PipelineError::Validation(format!("invalid expected value: {}", value)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InteractionKind, PositionUpdate, generate_id};
    use crate::pipeline::state::fixtures;
    use crate::state::{StateError, StateResponse};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// In-memory remote with call counting and failure injection
    #[derive(Default)]
    struct MockRemote {
        stages: StdMutex<Vec<Stage>>,
        prospects: StdMutex<Vec<Prospect>>,
        interactions: StdMutex<Vec<ProspectInteraction>>,
        calls: AtomicUsize,
        fail: AtomicBool,
        fail_log: AtomicBool,
        /// When set, reorder and insert wait until notified
        gate: Option<Arc<Notify>>,
    }

    impl MockRemote {
        fn seeded() -> Self {
            let state = fixtures::board();
            Self {
                stages: StdMutex::new(state.stages),
                prospects: StdMutex::new(state.prospects),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn fail_next(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        fn hit(&self) -> StateResponse<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(StateError::StoreError("injected failure".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PipelineRemote for MockRemote {
        async fn fetch_stages(&self) -> StateResponse<Vec<Stage>> {
            self.hit()?;
            Ok(self.stages.lock().unwrap().clone())
        }

        async fn fetch_prospects(&self, query: &ProspectQuery) -> StateResponse<Vec<Prospect>> {
            self.hit()?;
            Ok(self
                .prospects
                .lock()
                .unwrap()
                .iter()
                .filter(|p| query.matches(p))
                .cloned()
                .collect())
        }

        async fn insert_stage(&self, mut draft: Stage) -> StateResponse<Stage> {
            self.hit()?;
            draft.id = generate_id("stage", &draft.name);
            self.stages.lock().unwrap().push(draft.clone());
            Ok(draft)
        }

        async fn update_stage(&self, _id: &str, _patch: &StagePatch) -> StateResponse<()> {
            self.hit()
        }

        async fn reorder_stages(&self, _ordered_ids: &[String]) -> StateResponse<()> {
            self.hit()
        }

        async fn delete_stage(&self, id: &str) -> StateResponse<()> {
            self.hit()?;
            self.stages.lock().unwrap().retain(|s| s.id != id);
            Ok(())
        }

        async fn ensure_default_stages(&self, templates: &[StageTemplate]) -> StateResponse<usize> {
            self.hit()?;
            let mut stages = self.stages.lock().unwrap();
            let mut created = 0;
            for template in templates {
                if !stages.iter().any(|s| s.name == template.name) {
                    let position = stages.len() as u32;
                    stages.push(template.to_stage("u1", position));
                    created += 1;
                }
            }
            Ok(created)
        }

        async fn insert_prospect(&self, mut draft: Prospect) -> StateResponse<Prospect> {
            self.hit()?;
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            draft.id = generate_id("prospect", &draft.name);
            self.prospects.lock().unwrap().push(draft.clone());
            Ok(draft)
        }

        async fn update_prospect(&self, id: &str, patch: &ProspectPatch) -> StateResponse<Prospect> {
            self.hit()?;
            let mut prospects = self.prospects.lock().unwrap();
            let prospect = prospects
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| StateError::NotFound(id.to_string()))?;
            prospect.apply(patch);
            Ok(prospect.clone())
        }

        async fn delete_prospect(&self, id: &str) -> StateResponse<()> {
            self.hit()?;
            self.prospects.lock().unwrap().retain(|p| p.id != id);
            Ok(())
        }

        async fn reorder_prospects(&self, updates: &[PositionUpdate]) -> StateResponse<()> {
            self.hit()?;
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(StateError::StoreError("injected failure".to_string()));
            }
            let mut prospects = self.prospects.lock().unwrap();
            for update in updates {
                if let Some(p) = prospects.iter_mut().find(|p| p.id == update.id) {
                    p.stage_id = update.stage_id.clone();
                    p.position_in_stage = update.position_in_stage;
                }
            }
            Ok(())
        }

        async fn mark_won(&self, id: &str) -> StateResponse<()> {
            self.hit()?;
            let mut prospects = self.prospects.lock().unwrap();
            if let Some(p) = prospects.iter_mut().find(|p| p.id == id) {
                p.status = ProspectStatus::Won;
            }
            Ok(())
        }

        async fn mark_lost(&self, id: &str, reason: Option<&str>) -> StateResponse<()> {
            self.hit()?;
            let mut prospects = self.prospects.lock().unwrap();
            if let Some(p) = prospects.iter_mut().find(|p| p.id == id) {
                p.status = ProspectStatus::Lost;
                p.lost_reason = reason.map(str::to_string);
            }
            Ok(())
        }

        async fn convert_to_client(&self, id: &str) -> StateResponse<Client> {
            self.hit()?;
            let client = Client::new("u1", id);
            let mut prospects = self.prospects.lock().unwrap();
            if let Some(p) = prospects.iter_mut().find(|p| p.id == id) {
                p.converted_client_id = Some(client.id.clone());
                p.status = ProspectStatus::Won;
            }
            Ok(client)
        }

        async fn log_interaction(&self, input: NewInteraction) -> StateResponse<ProspectInteraction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_log.load(Ordering::SeqCst) {
                return Err(StateError::StoreError("log unavailable".to_string()));
            }
            let entry = ProspectInteraction::new("u1", input);
            self.interactions.lock().unwrap().push(entry.clone());
            Ok(entry)
        }

        async fn interactions(&self, prospect_id: &str) -> StateResponse<Vec<ProspectInteraction>> {
            self.hit()?;
            Ok(self
                .interactions
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.prospect_id == prospect_id)
                .cloned()
                .collect())
        }
    }

    async fn loaded(remote: MockRemote) -> (Arc<MockRemote>, PipelineBoard<MockRemote>) {
        let remote = Arc::new(remote);
        let board = PipelineBoard::new(remote.clone(), "u1");
        board.load(ProspectQuery::default()).await.unwrap();
        (remote, board)
    }

    fn bucket_ids(state: &PipelineState, stage_id: &str) -> Vec<String> {
        state.bucket(stage_id).iter().map(|p| p.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_move_across_stages_persists_and_logs() {
        let (remote, board) = loaded(MockRemote::seeded()).await;
        let mut events = board.subscribe();

        assert!(board.move_prospect("P1", "A", "B", 0).await.unwrap());

        let state = board.snapshot().await;
        assert_eq!(bucket_ids(&state, "A"), vec!["P2", "P3"]);
        assert_eq!(bucket_ids(&state, "B"), vec!["P1", "Q1", "Q2"]);
        assert_eq!(events.recv().await.unwrap(), BoardEvent::Changed { operation: "move" });

        let persisted = remote.prospects.lock().unwrap().clone();
        let p1 = persisted.iter().find(|p| p.id == "P1").unwrap();
        assert_eq!((p1.stage_id.as_str(), p1.position_in_stage), ("B", 0));

        let log = remote.interactions.lock().unwrap().clone();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, InteractionKind::StageChange);
        assert_eq!(log[0].to_stage_id.as_deref(), Some("B"));
        assert!(state.prospect("P1").unwrap().last_interaction_at.is_some());
    }

    #[tokio::test]
    async fn test_noop_move_makes_no_remote_call() {
        let (remote, board) = loaded(MockRemote::seeded()).await;
        let before = board.snapshot().await;
        let calls = remote.calls();

        assert!(!board.move_prospect("P2", "A", "A", 1).await.unwrap());
        assert_eq!(remote.calls(), calls);
        assert_eq!(board.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_failed_move_rolls_back() {
        let (remote, board) = loaded(MockRemote::seeded()).await;
        let before = board.snapshot().await;
        remote.fail_next(true);

        let err = board.move_prospect("P1", "A", "C", 0).await.unwrap_err();
        assert!(matches!(err, PipelineError::Remote(_)));
        assert_eq!(board.snapshot().await, before);
        assert!(board.last_error().await.unwrap().contains("injected failure"));
        assert!(!board.is_loading().await);
    }

    #[tokio::test]
    async fn test_stage_change_log_failure_keeps_move() {
        let remote = MockRemote::seeded();
        remote.fail_log.store(true, Ordering::SeqCst);
        let (_remote, board) = loaded(remote).await;

        assert!(board.move_prospect("Q1", "B", "A", 1).await.unwrap());
        let state = board.snapshot().await;
        assert_eq!(bucket_ids(&state, "A"), vec!["P1", "Q1", "P2", "P3"]);
        assert!(board.last_error().await.is_none());
    }

    #[tokio::test]
    async fn test_create_is_optimistic_then_reconciled() {
        let gate = Arc::new(Notify::new());
        let remote = MockRemote {
            gate: Some(gate.clone()),
            ..MockRemote::seeded()
        };
        let (_remote, board) = loaded(remote).await;
        let board = Arc::new(board);

        let pending = {
            let board = board.clone();
            tokio::spawn(async move { board.create_prospect(NewProspect::new("B", "Globex", 5000.0)).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        // Applied before the remote call resolves
        let optimistic = board.snapshot().await;
        let b = optimistic.stage("B").unwrap();
        assert_eq!(b.total_value, 6200.0);
        assert_eq!(b.prospect_count, 3);
        let placeholder = optimistic.bucket("B").last().unwrap();
        assert!(is_temp_id(&placeholder.id));
        assert_eq!(placeholder.position_in_stage, 2);

        gate.notify_waiters();
        let created = pending.await.unwrap().unwrap();
        assert!(!is_temp_id(&created.id));

        let state = board.snapshot().await;
        assert_eq!(bucket_ids(&state, "B").last().unwrap(), &created.id);
        assert!(state.prospects.iter().all(|p| !is_temp_id(&p.id)));
        assert_eq!(state.stage("B").unwrap().total_value, 6200.0);
    }

    #[tokio::test]
    async fn test_failed_create_rolls_back() {
        let (remote, board) = loaded(MockRemote::seeded()).await;
        let before = board.snapshot().await;
        remote.fail_next(true);

        assert!(board.create_prospect(NewProspect::new("B", "Globex", 5000.0)).await.is_err());
        assert_eq!(board.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_create_validation_makes_no_call() {
        let (remote, board) = loaded(MockRemote::seeded()).await;
        let calls = remote.calls();

        let err = board.create_prospect(NewProspect::new("B", "   ", 10.0)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        let err = board.create_prospect(NewProspect::new("B", "Neg", -1.0)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        let err = board.create_prospect(NewProspect::new("Z", "Nowhere", 1.0)).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));

        assert_eq!(remote.calls(), calls);
        assert!(board.last_error().await.is_some());
    }

    #[tokio::test]
    async fn test_update_and_rollback() {
        let (remote, board) = loaded(MockRemote::seeded()).await;
        let patch = ProspectPatch {
            expected_value: Some(1500.0),
            notes: Some("Budget approved".to_string()),
            ..Default::default()
        };
        let updated = board.update_prospect("P1", patch).await.unwrap();
        assert_eq!(updated.expected_value, 1500.0);
        assert_eq!(board.snapshot().await.stage("A").unwrap().total_value, 6500.0);

        let before = board.snapshot().await;
        remote.fail_next(true);
        let patch = ProspectPatch {
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert!(board.update_prospect("P1", patch).await.is_err());
        assert_eq!(board.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_delete_prospect() {
        let (remote, board) = loaded(MockRemote::seeded()).await;
        board.delete_prospect("P1").await.unwrap();
        let state = board.snapshot().await;
        assert_eq!(bucket_ids(&state, "A"), vec!["P2", "P3"]);
        assert_eq!(state.bucket("A")[0].position_in_stage, 0);
        assert_eq!(state.stage("A").unwrap().prospect_count, 2);

        remote.fail_next(true);
        let before = board.snapshot().await;
        assert!(board.delete_prospect("P2").await.is_err());
        assert_eq!(board.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_delete_stage_with_prospects_rejected_locally() {
        let (remote, board) = loaded(MockRemote::seeded()).await;
        let stages_before = board.snapshot().await.stages;
        let calls = remote.calls();

        let err = board.delete_stage("A").await.unwrap_err();
        assert!(matches!(err, PipelineError::StageNotEmpty(_)));
        assert!(err.is_local());
        assert_eq!(remote.calls(), calls);
        assert_eq!(board.snapshot().await.stages, stages_before);
        assert!(board.last_error().await.is_some());

        board.delete_stage("C").await.unwrap();
        assert_eq!(board.snapshot().await.stages.len(), 2);
    }

    #[tokio::test]
    async fn test_mark_won_reloads_from_remote() {
        let (remote, board) = loaded(MockRemote::seeded()).await;
        board.mark_won("P2").await.unwrap();
        assert_eq!(board.snapshot().await.prospect("P2").unwrap().status, ProspectStatus::Won);

        // Terminal prospects cannot transition again
        let calls = remote.calls();
        let err = board.mark_lost("P2", Some("price")).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition(_)));
        assert_eq!(remote.calls(), calls);
        assert!(!board.is_loading().await);
    }

    #[tokio::test]
    async fn test_mark_lost_failure_sets_error_without_rollback() {
        let (remote, board) = loaded(MockRemote::seeded()).await;
        let before = board.snapshot().await;
        remote.fail_next(true);
        assert!(board.mark_lost("P3", None).await.is_err());
        assert_eq!(board.snapshot().await, before);
        assert!(!board.is_loading().await);
        assert!(board.last_error().await.is_some());
    }

    #[tokio::test]
    async fn test_convert_guarded_against_repeat() {
        let (_remote, board) = loaded(MockRemote::seeded()).await;
        let client = board.convert_to_client("Q1").await.unwrap();
        let state = board.snapshot().await;
        assert_eq!(state.prospect("Q1").unwrap().converted_client_id.as_ref(), Some(&client.id));

        let err = board.convert_to_client("Q1").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_stage_lifecycle() {
        let (_remote, board) = loaded(MockRemote::seeded()).await;
        let stage = board.create_stage("Follow-up", Some("#000000"), 30).await.unwrap();
        assert!(!is_temp_id(&stage.id));

        let state = board.snapshot().await;
        assert_eq!(state.stages.last().unwrap().id, stage.id);
        assert_eq!(state.stages.last().unwrap().position, 3);
        assert!(state.by_stage.contains_key(&stage.id));

        board
            .update_stage(
                &stage.id,
                StagePatch {
                    name: Some("Retorno".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(board.snapshot().await.stage(&stage.id).unwrap().name, "Retorno");

        let order = vec![stage.id.clone(), "A".to_string(), "B".to_string(), "C".to_string()];
        board.reorder_stages(order).await.unwrap();
        assert_eq!(board.snapshot().await.stages[0].id, stage.id);
    }

    #[tokio::test]
    async fn test_ensure_default_stages_is_idempotent() {
        let (_remote, board) = loaded(MockRemote::default()).await;
        assert_eq!(board.ensure_default_stages().await.unwrap(), 6);
        assert_eq!(board.ensure_default_stages().await.unwrap(), 0);
        assert_eq!(board.snapshot().await.stages.len(), 6);
    }

    #[tokio::test]
    async fn test_load_applies_query() {
        let (_remote, board) = loaded(MockRemote::seeded()).await;
        board
            .load(ProspectQuery {
                min_value: Some(1500.0),
                ..Default::default()
            })
            .await
            .unwrap();
        let state = board.snapshot().await;
        assert_eq!(state.prospects.len(), 2);
        assert_eq!(state.stage("B").unwrap().prospect_count, 0);
    }

    #[tokio::test]
    async fn test_interactions_newest_first() {
        let (_remote, board) = loaded(MockRemote::seeded()).await;
        board
            .log_interaction(NewInteraction::new("P1", InteractionKind::Call, "Intro"))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        board
            .log_interaction(NewInteraction::new("P1", InteractionKind::Email, "Follow-up"))
            .await
            .unwrap();

        let entries = board.interactions("P1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Follow-up");

        let err = board
            .log_interaction(NewInteraction::new("P1", InteractionKind::Note, " "))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_second_move_runs_while_first_pending() {
        let gate = Arc::new(Notify::new());
        let remote = MockRemote {
            gate: Some(gate.clone()),
            ..MockRemote::seeded()
        };
        let (_remote, board) = loaded(remote).await;
        let board = Arc::new(board);

        let first = {
            let board = board.clone();
            tokio::spawn(async move { board.move_prospect("P1", "A", "C", 0).await })
        };
        // Let the first move apply and block in the remote call
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let optimistic = board.snapshot().await;
        assert_eq!(bucket_ids(&optimistic, "C"), vec!["P1"]);

        let second = {
            let board = board.clone();
            tokio::spawn(async move { board.move_prospect("P2", "A", "C", 1).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(bucket_ids(&board.snapshot().await, "C"), vec!["P1", "P2"]);

        gate.notify_waiters();
        assert!(first.await.unwrap().unwrap());
        assert!(second.await.unwrap().unwrap());
    }
}
