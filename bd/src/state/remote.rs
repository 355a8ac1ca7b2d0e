//! Backend-side pipeline and goal operations
//!
//! The StateManager plays the role of the remote persistence service for the
//! pipeline board and goal tracker. Operations that touch several rows write
//! them in one atomic update where possible.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use rowstore::now_ms;
use tracing::{debug, info};

use crate::domain::{
    Client, Filter, Goal, GoalStatus, InteractionKind, NewInteraction, PositionUpdate, Prospect, ProspectInteraction,
    ProspectPatch, ProspectQuery, ProspectStatus, Stage, StagePatch, StageTemplate, generate_id, is_temp_id,
    newest_first,
};
use crate::goals::GoalRemote;
use crate::pipeline::PipelineRemote;

use super::manager::StateManager;
use super::messages::{StateError, StateResponse};

impl StateManager {
    async fn owned_stage(&self, id: &str) -> StateResponse<Stage> {
        let stage: Stage = self.get_required(id).await?;
        if stage.owner_id != self.owner_id() {
            return Err(StateError::NotFound(format!("stages {}", id)));
        }
        Ok(stage)
    }

    async fn owned_prospect(&self, id: &str) -> StateResponse<Prospect> {
        let prospect: Prospect = self.get_required(id).await?;
        if prospect.owner_id != self.owner_id() {
            return Err(StateError::NotFound(format!("prospects {}", id)));
        }
        Ok(prospect)
    }

    async fn stage_members(&self, stage_id: &str) -> StateResponse<Vec<Prospect>> {
        let mut members: Vec<Prospect> = self.list_owned(vec![Filter::eq("stage_id", stage_id)]).await?;
        members.sort_by_key(|p| p.position_in_stage);
        Ok(members)
    }

    /// Close position gaps in a stage, skipping `except`
    async fn renumber_stage(&self, stage_id: &str, except: &str) -> StateResponse<Vec<Prospect>> {
        let members = self.stage_members(stage_id).await?;
        Ok(members
            .into_iter()
            .filter(|p| p.id != except)
            .enumerate()
            .filter_map(|(pos, mut p)| {
                let pos = pos as u32;
                (p.position_in_stage != pos).then(|| {
                    p.position_in_stage = pos;
                    p
                })
            })
            .collect())
    }

    async fn record_interaction(&self, input: NewInteraction) -> StateResponse<ProspectInteraction> {
        let entry = ProspectInteraction::new(self.owner_id(), input);
        self.create(&entry).await?;
        Ok(entry)
    }

    /// Close a prospect as won or lost, moving it to the matching stage
    async fn close_prospect(&self, id: &str, status: ProspectStatus, reason: Option<&str>) -> StateResponse<Prospect> {
        debug!(%id, %status, ?reason, "close_prospect: called");
        let mut prospect = self.owned_prospect(id).await?;
        if prospect.status.is_terminal() {
            return Err(StateError::Rejected(format!("prospect {} is already {}", id, prospect.status)));
        }

        let stages: Vec<Stage> = self.list_owned(vec![]).await?;
        let target = stages.iter().find(|s| match status {
            ProspectStatus::Won => s.is_win_stage,
            _ => s.is_loss_stage,
        });

        let now = now_ms();
        let mut changed = Vec::new();
        let label = if status == ProspectStatus::Won { "ganho" } else { "perdido" };
        let title = format!("Marcado como {}", label);
        let entry = match target {
            Some(stage) if stage.id != prospect.stage_id => {
                let from = prospect.stage_id.clone();
                changed.extend(self.renumber_stage(&from, id).await?);
                prospect.position_in_stage = self.stage_members(&stage.id).await?.len() as u32;
                prospect.stage_id = stage.id.clone();
                prospect.entered_stage_at = now;
                NewInteraction::stage_change(id, &from, &stage.id, title)
            }
            _ => NewInteraction::new(id, InteractionKind::Note, title),
        };

        prospect.status = status;
        if status == ProspectStatus::Lost {
            prospect.lost_reason = reason.map(str::to_string);
        }
        prospect.updated_at = now;
        prospect.last_interaction_at = Some(now);
        changed.push(prospect.clone());
        self.update_all(&changed).await?;
        self.record_interaction(entry).await?;

        info!(%id, %status, "Prospect closed");
        Ok(prospect)
    }

    /// Expire draft and active goals whose period ended before `today`
    pub async fn expire_overdue(&self, today: NaiveDate) -> StateResponse<usize> {
        debug!(%today, "expire_overdue: called");
        let goals: Vec<Goal> = self.list_owned(vec![]).await?;
        let expired: Vec<Goal> = goals
            .into_iter()
            .filter(|g| !g.status.is_closed() && g.end_date < today)
            .map(|mut g| {
                g.set_status(GoalStatus::Expired);
                g
            })
            .collect();
        self.update_all(&expired).await?;
        if !expired.is_empty() {
            info!(count = expired.len(), "Expired overdue goals");
        }
        Ok(expired.len())
    }
}

#[async_trait]
impl PipelineRemote for StateManager {
    async fn fetch_stages(&self) -> StateResponse<Vec<Stage>> {
        debug!("fetch_stages: called");
        let mut stages: Vec<Stage> = self.list_owned(vec![]).await?;
        stages.sort_by_key(|s| s.position);
        Ok(stages)
    }

    async fn fetch_prospects(&self, query: &ProspectQuery) -> StateResponse<Vec<Prospect>> {
        debug!(?query, "fetch_prospects: called");
        let prospects: Vec<Prospect> = self.list(query.index_filters(self.owner_id())).await?;
        Ok(prospects.into_iter().filter(|p| query.matches(p)).collect())
    }

    async fn insert_stage(&self, mut draft: Stage) -> StateResponse<Stage> {
        debug!(name = %draft.name, "insert_stage: called");
        if is_temp_id(&draft.id) {
            draft.id = generate_id("stage", &draft.name);
        }
        let now = now_ms();
        draft.owner_id = self.owner_id().to_string();
        draft.prospect_count = 0;
        draft.total_value = 0.0;
        draft.weighted_value = 0.0;
        draft.created_at = now;
        draft.updated_at = now;
        self.create(&draft).await?;
        Ok(draft)
    }

    async fn update_stage(&self, id: &str, patch: &StagePatch) -> StateResponse<()> {
        debug!(%id, "update_stage: called");
        let mut stage = self.owned_stage(id).await?;
        stage.apply(patch);
        self.update(&stage).await
    }

    async fn reorder_stages(&self, ordered_ids: &[String]) -> StateResponse<()> {
        debug!(count = ordered_ids.len(), "reorder_stages: called");
        let mut stages: Vec<Stage> = self.list_owned(vec![]).await?;
        for (pos, id) in ordered_ids.iter().enumerate() {
            let stage = stages
                .iter_mut()
                .find(|s| &s.id == id)
                .ok_or_else(|| StateError::NotFound(format!("stages {}", id)))?;
            stage.position = pos as u32;
            stage.updated_at = now_ms();
        }
        self.update_all(&stages).await
    }

    async fn delete_stage(&self, id: &str) -> StateResponse<()> {
        debug!(%id, "delete_stage: called");
        let stage = self.owned_stage(id).await?;
        if stage.is_protected() {
            return Err(StateError::Rejected(format!("stage {} is protected", stage.name)));
        }
        if !self.stage_members(id).await?.is_empty() {
            return Err(StateError::Rejected(format!("stage {} still has prospects", stage.name)));
        }
        self.delete::<Stage>(id).await?;

        // Keep stage positions contiguous
        let mut remaining: Vec<Stage> = self.list_owned(vec![]).await?;
        remaining.sort_by_key(|s| s.position);
        for (pos, stage) in remaining.iter_mut().enumerate() {
            stage.position = pos as u32;
        }
        self.update_all(&remaining).await
    }

    async fn ensure_default_stages(&self, templates: &[StageTemplate]) -> StateResponse<usize> {
        debug!(template_count = templates.len(), "ensure_default_stages: called");
        let existing: Vec<Stage> = self.list_owned(vec![]).await?;
        let mut position = existing.len() as u32;
        let mut created = 0;
        for template in templates {
            if existing.iter().any(|s| s.name == template.name) {
                continue;
            }
            let stage = template.to_stage(self.owner_id(), position);
            self.create(&stage).await?;
            position += 1;
            created += 1;
        }
        if created > 0 {
            info!(created, "Created default stages");
        }
        Ok(created)
    }

    async fn insert_prospect(&self, mut draft: Prospect) -> StateResponse<Prospect> {
        debug!(stage_id = %draft.stage_id, name = %draft.name, "insert_prospect: called");
        self.owned_stage(&draft.stage_id).await?;
        if is_temp_id(&draft.id) {
            draft.id = generate_id("prospect", &draft.name);
        }
        draft.position_in_stage = self.stage_members(&draft.stage_id).await?.len() as u32;
        let now = now_ms();
        draft.owner_id = self.owner_id().to_string();
        draft.status = ProspectStatus::Open;
        draft.created_at = now;
        draft.updated_at = now;
        draft.entered_stage_at = now;
        self.create(&draft).await?;
        Ok(draft)
    }

    async fn update_prospect(&self, id: &str, patch: &ProspectPatch) -> StateResponse<Prospect> {
        debug!(%id, "update_prospect: called");
        let mut prospect = self.owned_prospect(id).await?;
        prospect.apply(patch);
        self.update(&prospect).await?;
        Ok(prospect)
    }

    async fn delete_prospect(&self, id: &str) -> StateResponse<()> {
        debug!(%id, "delete_prospect: called");
        let prospect = self.owned_prospect(id).await?;
        let renumbered = self.renumber_stage(&prospect.stage_id, id).await?;
        self.delete::<Prospect>(id).await?;
        self.update_all(&renumbered).await
    }

    async fn reorder_prospects(&self, updates: &[PositionUpdate]) -> StateResponse<()> {
        debug!(count = updates.len(), "reorder_prospects: called");
        let now = now_ms();
        let mut placed = Vec::with_capacity(updates.len());
        let mut touched = BTreeSet::new();
        for update in updates {
            let mut prospect = self.owned_prospect(&update.id).await?;
            touched.insert(prospect.stage_id.clone());
            if prospect.stage_id != update.stage_id {
                self.owned_stage(&update.stage_id).await?;
                prospect.stage_id = update.stage_id.clone();
                touched.insert(update.stage_id.clone());
            }
            prospect.position_in_stage = update.position_in_stage;
            if let Some(entered) = update.entered_stage_at {
                prospect.entered_stage_at = entered;
            }
            prospect.updated_at = now;
            placed.push(prospect);
        }

        // A filtered board sends only the members it sees; merge them with the
        // rest of each stage and renumber the whole stage. Ties go to the sent
        // order, so a prospect dropped at index 0 lands at the front.
        let mut changed = Vec::with_capacity(placed.len());
        for stage_id in &touched {
            let mut merged: Vec<(u32, bool, Prospect)> = self
                .stage_members(stage_id)
                .await?
                .into_iter()
                .filter(|p| !updates.iter().any(|u| u.id == p.id))
                .map(|p| (p.position_in_stage, true, p))
                .collect();
            merged.extend(
                placed
                    .iter()
                    .filter(|p| &p.stage_id == stage_id)
                    .map(|p| (p.position_in_stage, false, p.clone())),
            );
            merged.sort_by_key(|(pos, unsent, _)| (*pos, *unsent));

            for (pos, (_, unsent, mut prospect)) in merged.into_iter().enumerate() {
                let pos = pos as u32;
                if unsent && prospect.position_in_stage == pos {
                    continue;
                }
                prospect.position_in_stage = pos;
                changed.push(prospect);
            }
        }
        self.update_all(&changed).await
    }

    async fn mark_won(&self, id: &str) -> StateResponse<()> {
        self.close_prospect(id, ProspectStatus::Won, None).await.map(|_| ())
    }

    async fn mark_lost(&self, id: &str, reason: Option<&str>) -> StateResponse<()> {
        self.close_prospect(id, ProspectStatus::Lost, reason).await.map(|_| ())
    }

    async fn convert_to_client(&self, id: &str) -> StateResponse<Client> {
        debug!(%id, "convert_to_client: called");
        let mut prospect = self.owned_prospect(id).await?;
        if let Some(client_id) = &prospect.converted_client_id {
            debug!(%id, %client_id, "convert_to_client: already converted");
            return self.get_required(client_id).await;
        }
        if prospect.status == ProspectStatus::Lost {
            return Err(StateError::Rejected(format!("prospect {} is lost", id)));
        }
        if prospect.status == ProspectStatus::Open {
            prospect = self.close_prospect(id, ProspectStatus::Won, None).await?;
        }

        // Reuse a client left behind by an interrupted conversion
        let existing: Vec<Client> = self.list_owned(vec![Filter::eq("prospect_id", id)]).await?;
        let client = match existing.into_iter().next() {
            Some(client) => client,
            None => {
                let mut client = Client::new(self.owner_id(), prospect.name.clone());
                client.company = prospect.company.clone();
                client.email = prospect.email.clone();
                client.phone = prospect.phone.clone();
                client.mrr = prospect.expected_value;
                client.prospect_id = Some(prospect.id.clone());
                self.create(&client).await?;
                client
            }
        };

        let now = now_ms();
        prospect.converted_client_id = Some(client.id.clone());
        prospect.converted_at = Some(now);
        prospect.updated_at = now;
        self.update(&prospect).await?;
        self.record_interaction(NewInteraction::new(id, InteractionKind::Note, "Convertido em cliente"))
            .await?;

        info!(%id, client_id = %client.id, "Prospect converted");
        Ok(client)
    }

    async fn log_interaction(&self, input: NewInteraction) -> StateResponse<ProspectInteraction> {
        debug!(prospect_id = %input.prospect_id, kind = %input.kind, "log_interaction: called");
        let mut prospect = self.owned_prospect(&input.prospect_id).await?;
        let entry = self.record_interaction(input).await?;
        prospect.last_interaction_at = Some(entry.created_at);
        self.update(&prospect).await?;
        Ok(entry)
    }

    async fn interactions(&self, prospect_id: &str) -> StateResponse<Vec<ProspectInteraction>> {
        debug!(%prospect_id, "interactions: called");
        let mut entries: Vec<ProspectInteraction> =
            self.list_owned(vec![Filter::eq("prospect_id", prospect_id)]).await?;
        newest_first(&mut entries);
        Ok(entries)
    }
}

#[async_trait]
impl GoalRemote for StateManager {
    async fn insert_goal(&self, mut goal: Goal) -> StateResponse<Goal> {
        debug!(title = %goal.title, "insert_goal: called");
        goal.owner_id = self.owner_id().to_string();
        self.create(&goal).await?;
        Ok(goal)
    }

    async fn fetch_goal(&self, id: &str) -> StateResponse<Option<Goal>> {
        let goal: Option<Goal> = self.get(id).await?;
        Ok(goal.filter(|g| g.owner_id == self.owner_id()))
    }

    async fn save_goal(&self, goal: &Goal) -> StateResponse<()> {
        debug!(id = %goal.id, status = %goal.status, "save_goal: called");
        self.update(goal).await
    }

    async fn fetch_goals(&self, status: Option<GoalStatus>) -> StateResponse<Vec<Goal>> {
        let filters = status.map(|s| vec![Filter::eq("status", s.to_string())]).unwrap_or_default();
        self.list_owned(filters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MetricValues, NewProspect, PeriodType, default_stage_templates};

    async fn seeded() -> (StateManager, Vec<Stage>) {
        let manager = StateManager::spawn_in_memory("u1").unwrap();
        manager.ensure_default_stages(&default_stage_templates()).await.unwrap();
        let stages = manager.fetch_stages().await.unwrap();
        (manager, stages)
    }

    async fn add(manager: &StateManager, stage: &Stage, name: &str, position: u32) -> Prospect {
        let draft = Prospect::draft("u1", &NewProspect::new(&stage.id, name, 1000.0), position);
        manager.insert_prospect(draft).await.unwrap()
    }

    #[tokio::test]
    async fn test_default_stages_idempotent() {
        let (manager, stages) = seeded().await;
        assert_eq!(stages.len(), 6);
        assert_eq!(stages[0].name, "Lead");
        assert_eq!(manager.ensure_default_stages(&default_stage_templates()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_prospect_assigns_canonical_id() {
        let (manager, stages) = seeded().await;
        let prospect = add(&manager, &stages[0], "Acme", 0).await;
        assert!(!is_temp_id(&prospect.id));
        assert!(prospect.id.contains("prospect-acme"));

        let draft = Prospect::draft("u1", &NewProspect::new("missing", "Ghost", 1.0), 0);
        assert!(matches!(
            manager.insert_prospect(draft).await,
            Err(StateError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_won_moves_to_win_stage() {
        let (manager, stages) = seeded().await;
        let a = add(&manager, &stages[0], "Acme", 0).await;
        let b = add(&manager, &stages[0], "Globex", 1).await;

        manager.mark_won(&a.id).await.unwrap();

        let won: Prospect = manager.get_required(&a.id).await.unwrap();
        let win_stage = stages.iter().find(|s| s.is_win_stage).unwrap();
        assert_eq!(won.status, ProspectStatus::Won);
        assert_eq!(won.stage_id, win_stage.id);
        assert_eq!(won.position_in_stage, 0);

        let left: Prospect = manager.get_required(&b.id).await.unwrap();
        assert_eq!(left.position_in_stage, 0);

        let log = manager.interactions(&a.id).await.unwrap();
        assert_eq!(log[0].kind, InteractionKind::StageChange);

        assert!(matches!(manager.mark_lost(&a.id, None).await, Err(StateError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_mark_lost_records_reason() {
        let (manager, stages) = seeded().await;
        let a = add(&manager, &stages[1], "Acme", 0).await;
        manager.mark_lost(&a.id, Some("Too expensive")).await.unwrap();
        let lost: Prospect = manager.get_required(&a.id).await.unwrap();
        assert_eq!(lost.status, ProspectStatus::Lost);
        assert_eq!(lost.lost_reason.as_deref(), Some("Too expensive"));
        assert!(stages.iter().any(|s| s.is_loss_stage && s.id == lost.stage_id));
    }

    #[tokio::test]
    async fn test_convert_is_idempotent() {
        let (manager, stages) = seeded().await;
        let a = add(&manager, &stages[2], "Acme", 0).await;

        let first = manager.convert_to_client(&a.id).await.unwrap();
        let second = manager.convert_to_client(&a.id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.mrr, 1000.0);

        let clients: Vec<Client> = manager.list_owned(vec![]).await.unwrap();
        assert_eq!(clients.len(), 1);

        let converted: Prospect = manager.get_required(&a.id).await.unwrap();
        assert_eq!(converted.status, ProspectStatus::Won);
        assert_eq!(converted.converted_client_id.as_deref(), Some(first.id.as_str()));
    }

    #[tokio::test]
    async fn test_delete_stage_rules() {
        let (manager, stages) = seeded().await;
        let contato = &stages[1];
        add(&manager, contato, "Acme", 0).await;

        assert!(matches!(manager.delete_stage(&contato.id).await, Err(StateError::Rejected(_))));
        assert!(matches!(manager.delete_stage(&stages[0].id).await, Err(StateError::Rejected(_))));

        manager.delete_stage(&stages[2].id).await.unwrap();
        let remaining = manager.fetch_stages().await.unwrap();
        let positions: Vec<u32> = remaining.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_reorder_prospects_is_atomic() {
        let (manager, stages) = seeded().await;
        let a = add(&manager, &stages[0], "Acme", 0).await;
        let updates = vec![
            PositionUpdate {
                id: a.id.clone(),
                stage_id: stages[1].id.clone(),
                position_in_stage: 0,
                entered_stage_at: Some(42),
            },
            PositionUpdate {
                id: "missing".to_string(),
                stage_id: stages[1].id.clone(),
                position_in_stage: 1,
                entered_stage_at: None,
            },
        ];
        assert!(manager.reorder_prospects(&updates).await.is_err());
        let unchanged: Prospect = manager.get_required(&a.id).await.unwrap();
        assert_eq!(unchanged.stage_id, stages[0].id);

        manager.reorder_prospects(&updates[..1]).await.unwrap();
        let moved: Prospect = manager.get_required(&a.id).await.unwrap();
        assert_eq!(moved.stage_id, stages[1].id);
        assert_eq!(moved.entered_stage_at, 42);
    }

    #[tokio::test]
    async fn test_partial_reorder_renumbers_whole_stage() {
        let (manager, stages) = seeded().await;
        add(&manager, &stages[0], "A", 0).await;
        let b = add(&manager, &stages[0], "B", 1).await;
        let c = add(&manager, &stages[0], "C", 2).await;

        // Only B and C were visible; C is dropped in front of B
        let update = |p: &Prospect, position_in_stage| PositionUpdate {
            id: p.id.clone(),
            stage_id: stages[0].id.clone(),
            position_in_stage,
            entered_stage_at: None,
        };
        manager
            .reorder_prospects(&[update(&c, 0), update(&b, 1)])
            .await
            .unwrap();

        let order: Vec<(String, u32)> = manager
            .stage_members(&stages[0].id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| (p.name, p.position_in_stage))
            .collect();
        assert_eq!(
            order,
            vec![("C".to_string(), 0), ("A".to_string(), 1), ("B".to_string(), 2)]
        );

        let d = add(&manager, &stages[0], "D", 0).await;
        assert_eq!(d.position_in_stage, 3);
    }

    #[tokio::test]
    async fn test_delete_prospect_renumbers_stage() {
        let (manager, stages) = seeded().await;
        let a = add(&manager, &stages[0], "A", 0).await;
        let b = add(&manager, &stages[0], "B", 1).await;
        let c = add(&manager, &stages[0], "C", 2).await;

        manager.delete_prospect(&a.id).await.unwrap();
        let b: Prospect = manager.get_required(&b.id).await.unwrap();
        let c: Prospect = manager.get_required(&c.id).await.unwrap();
        assert_eq!((b.position_in_stage, c.position_in_stage), (0, 1));
    }

    #[tokio::test]
    async fn test_expire_overdue() {
        let manager = StateManager::spawn_in_memory("u1").unwrap();
        let jan = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let goal = Goal::draft(
            "u1",
            PeriodType::Custom,
            jan(1),
            jan(10),
            "Sprint".to_string(),
            MetricValues::default(),
        );
        manager.insert_goal(goal.clone()).await.unwrap();

        assert_eq!(manager.expire_overdue(jan(10)).await.unwrap(), 0);
        assert_eq!(manager.expire_overdue(jan(11)).await.unwrap(), 1);
        let expired = manager.fetch_goal(&goal.id).await.unwrap().unwrap();
        assert_eq!(expired.status, GoalStatus::Expired);
        assert_eq!(manager.expire_overdue(jan(20)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_other_owner_invisible() {
        let (manager, stages) = seeded().await;
        let mut foreign = Prospect::draft("u2", &NewProspect::new(&stages[0].id, "Foreign", 1.0), 0);
        foreign.id = "foreign".to_string();
        manager.create(&foreign).await.unwrap();

        assert!(manager.fetch_prospects(&ProspectQuery::default()).await.unwrap().is_empty());
        assert!(matches!(
            manager.delete_prospect("foreign").await,
            Err(StateError::NotFound(_))
        ));
    }
}
