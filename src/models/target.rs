use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person of interest tracked by a mission.
///
/// Targets are created together with their mission and cannot be added or
/// removed later. Once a target (or its mission) is complete it is frozen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Target {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub name: String,
    pub country: String,
    /// Free-form field notes collected by the assigned cat.
    pub notes: String,
    pub complete: bool,
}

/// Input for a target, supplied as part of mission creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTargetInput {
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub notes: String,
}

/// Partial update of a target. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTargetInput {
    pub notes: Option<String>,
    pub complete: Option<bool>,
}
