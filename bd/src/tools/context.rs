//! ToolContext - execution context for one assistant turn

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::{Insight, Notification, Priority, Reminder, Task};
use crate::state::{StateManager, StateResponse};

/// A write requested by a tool, applied only when the turn completes
#[derive(Debug, Clone, PartialEq)]
pub enum StagedWrite {
    CreateTask(Task),
    SetTaskPriority { task_id: String, priority: Priority },
    CreateNotification(Notification),
    CreateInsight(Insight),
    CreateReminder(Reminder),
}

impl StagedWrite {
    fn describe(&self) -> &'static str {
        match self {
            Self::CreateTask(_) => "create_task",
            Self::SetTaskPriority { .. } => "set_task_priority",
            Self::CreateNotification(_) => "create_notification",
            Self::CreateInsight(_) => "create_insight",
            Self::CreateReminder(_) => "create_reminder",
        }
    }
}

/// Execution context for tools, scoped to one owner and one turn
///
/// Reads go straight to the state manager. Writes are staged and reach the
/// store only through [`ToolContext::commit`], so a turn that fails midway
/// leaves nothing behind.
#[derive(Clone)]
pub struct ToolContext {
    pub state: StateManager,

    /// Date metrics and summaries are computed against
    pub today: NaiveDate,

    staged: Arc<Mutex<Vec<StagedWrite>>>,
}

impl ToolContext {
    pub fn new(state: StateManager, today: NaiveDate) -> Self {
        debug!(owner_id = %state.owner_id(), %today, "ToolContext::new: called");
        Self {
            state,
            today,
            staged: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn owner_id(&self) -> &str {
        self.state.owner_id()
    }

    pub async fn stage(&self, write: StagedWrite) {
        debug!(kind = write.describe(), "ToolContext::stage: called");
        self.staged.lock().await.push(write);
    }

    pub async fn staged(&self) -> Vec<StagedWrite> {
        self.staged.lock().await.clone()
    }

    /// Task created earlier in this turn, if any
    pub async fn staged_task(&self, id: &str) -> Option<Task> {
        self.staged.lock().await.iter().find_map(|w| match w {
            StagedWrite::CreateTask(task) if task.id == id => Some(task.clone()),
            _ => None,
        })
    }

    /// Drop everything staged so far
    pub async fn discard(&self) -> usize {
        let mut staged = self.staged.lock().await;
        let count = staged.len();
        staged.clear();
        if count > 0 {
            info!(count, "Discarded staged tool writes");
        }
        count
    }

    /// Apply staged writes in order, returning how many were applied
    pub async fn commit(&self) -> StateResponse<usize> {
        let writes: Vec<StagedWrite> = std::mem::take(&mut *self.staged.lock().await);
        debug!(count = writes.len(), "ToolContext::commit: called");

        // Priority changes to tasks created in the same turn fold into the create
        let mut pending: Vec<StagedWrite> = Vec::with_capacity(writes.len());
        for write in writes {
            if let StagedWrite::SetTaskPriority { task_id, priority } = &write
                && let Some(StagedWrite::CreateTask(task)) = pending
                    .iter_mut()
                    .find(|w| matches!(w, StagedWrite::CreateTask(t) if &t.id == task_id))
            {
                task.priority = *priority;
                continue;
            }
            pending.push(write);
        }

        let count = pending.len();
        for write in pending {
            match write {
                StagedWrite::CreateTask(task) => {
                    self.state.create(&task).await?;
                }
                StagedWrite::SetTaskPriority { task_id, priority } => {
                    let mut task: Task = self.state.get_required(&task_id).await?;
                    task.priority = priority;
                    task.updated_at = rowstore::now_ms();
                    self.state.update(&task).await?;
                }
                StagedWrite::CreateNotification(notification) => {
                    self.state.create(&notification).await?;
                }
                StagedWrite::CreateInsight(insight) => {
                    self.state.create(&insight).await?;
                }
                StagedWrite::CreateReminder(reminder) => {
                    self.state.create(&reminder).await?;
                }
            }
        }
        if count > 0 {
            info!(count, "Committed tool writes");
        }
        Ok(count)
    }
}
