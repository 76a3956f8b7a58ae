use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cat, CreateTargetInput, Target};

/// A mission row.
///
/// `complete` is never set directly: it latches to `true` when the last
/// target of the mission is completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mission {
    pub id: Uuid,
    /// The assigned cat, if any. Completed missions keep their cat.
    pub cat_id: Option<Uuid>,
    pub complete: bool,
    pub created_at: DateTime<Utc>,
}

impl Mission {
    /// Whether the mission still counts against its cat's one-mission limit.
    pub fn is_active(&self) -> bool {
        !self.complete
    }
}

/// A mission together with its targets and assigned cat, used for responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionWithTargets {
    #[serde(flatten)]
    pub mission: Mission,
    pub targets: Vec<Target>,
    pub cat: Option<Cat>,
}

/// Input for creating a mission. Targets are created in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMissionInput {
    pub targets: Vec<CreateTargetInput>,
}

/// Input for assigning a cat to a mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignCatInput {
    pub cat_id: Uuid,
}

/// Query filters for listing missions. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionFilter {
    pub cat_id: Option<Uuid>,
    pub complete: Option<bool>,
}
