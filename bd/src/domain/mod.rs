//! Domain types for bizdesk
//!
//! Pipeline types (Stage, Prospect, ProspectInteraction), goals, and the
//! business records the AI manager works with. All implement the Record
//! trait for RowStore persistence.

mod business;
mod goal;
mod id;
mod interaction;
mod priority;
mod prospect;
mod stage;

pub use business::{Client, ClientStatus, Insight, Notification, Payment, Reminder, Task, TaskStatus};
pub use goal::{Goal, GoalStatus, MetricKind, MetricValues, PeriodType};
pub use id::{IdResolver, generate_id, is_temp_id, temp_id};
pub use interaction::{InteractionKind, NewInteraction, ProspectInteraction, newest_first};
pub use priority::Priority;
pub use prospect::{NewProspect, PositionUpdate, Prospect, ProspectPatch, ProspectQuery, ProspectStatus};
pub use stage::{DEFAULT_COLOR, Stage, StagePatch, StageTemplate, default_stage_templates};

// Re-export rowstore types for convenience
pub use rowstore::{Filter, FilterOp, IndexValue, Record, Store};
