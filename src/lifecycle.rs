//! Mission and target lifecycle rules.
//!
//! Every check here is a pure predicate over entity state that the caller has
//! already loaded. Nothing in this module touches the database: the store runs
//! the relevant check inside its transaction and only writes when it passes.

use thiserror::Error;

use crate::breeds::BreedClassifier;
use crate::models::*;

/// Minimum number of targets a mission may be created with.
pub const MIN_TARGETS: usize = 1;
/// Maximum number of targets a mission may be created with.
pub const MAX_TARGETS: usize = 3;

/// Why a requested mutation was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    #[error("Spy cat not found")]
    CatNotFound,

    #[error("Mission not found")]
    MissionNotFound,

    #[error("Target not found")]
    TargetNotFound,

    #[error("Invalid cat breed '{0}'")]
    InvalidBreed(String),

    #[error("Salary must be a non-negative number, got {0}")]
    InvalidSalary(f64),

    #[error("Mission must have between 1 and 3 targets, got {0}")]
    InvalidTargetCount(usize),

    #[error("Cannot delete cat with active missions")]
    CatHasActiveMission,

    #[error("Cat already has an active mission")]
    CatAlreadyAssigned,

    #[error("Mission is already assigned to another cat")]
    MissionAlreadyAssigned,

    #[error("Mission is not assigned to a cat")]
    MissionNotAssigned,

    #[error("Cannot delete mission that is assigned to a cat")]
    MissionAssignedToCat,

    #[error("Cannot update completed target or target in completed mission")]
    TargetOrMissionComplete,
}

/// Coarse classification of a [`LifecycleError`], used to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    StateConflict,
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CatNotFound | Self::MissionNotFound | Self::TargetNotFound => ErrorKind::NotFound,
            Self::InvalidBreed(_) | Self::InvalidSalary(_) | Self::InvalidTargetCount(_) => {
                ErrorKind::Validation
            }
            Self::CatHasActiveMission
            | Self::CatAlreadyAssigned
            | Self::MissionAlreadyAssigned
            | Self::MissionNotAssigned
            | Self::MissionAssignedToCat
            | Self::TargetOrMissionComplete => ErrorKind::StateConflict,
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

// ============================================================
// Cats
// ============================================================

/// Check a breed against the catalogue. Classifier failures count as "invalid".
pub async fn validate_cat_creation(classifier: &dyn BreedClassifier, breed: &str) -> Result<()> {
    if classifier.is_valid_breed(breed).await {
        Ok(())
    } else {
        Err(LifecycleError::InvalidBreed(breed.to_string()))
    }
}

pub fn validate_salary(salary: f64) -> Result<()> {
    if salary.is_finite() && salary >= 0.0 {
        Ok(())
    } else {
        Err(LifecycleError::InvalidSalary(salary))
    }
}

/// A cat can only be retired once none of its missions are still running.
pub fn validate_cat_deletion(_cat: &Cat, missions: &[Mission]) -> Result<()> {
    if missions.iter().any(Mission::is_active) {
        return Err(LifecycleError::CatHasActiveMission);
    }
    Ok(())
}

// ============================================================
// Missions
// ============================================================

pub fn validate_mission_creation(targets: &[CreateTargetInput]) -> Result<()> {
    if (MIN_TARGETS..=MAX_TARGETS).contains(&targets.len()) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTargetCount(targets.len()))
    }
}

/// Check that `cat` may take on `mission`.
///
/// `cat_missions` are all missions currently linked to the cat. Assigning the
/// same cat twice is reported as [`LifecycleError::CatAlreadyAssigned`] when
/// the mission is still active, since the cat then already holds it.
pub fn validate_mission_assignment(
    mission: Option<&Mission>,
    cat: Option<&Cat>,
    cat_missions: &[Mission],
) -> Result<()> {
    let mission = mission.ok_or(LifecycleError::MissionNotFound)?;
    let cat = cat.ok_or(LifecycleError::CatNotFound)?;

    if let Some(current) = mission.cat_id {
        if current != cat.id {
            return Err(LifecycleError::MissionAlreadyAssigned);
        }
    }

    if cat_missions.iter().any(Mission::is_active) {
        return Err(LifecycleError::CatAlreadyAssigned);
    }

    Ok(())
}

pub fn validate_mission_unassignment(mission: &Mission) -> Result<()> {
    match mission.cat_id {
        Some(_) => Ok(()),
        None => Err(LifecycleError::MissionNotAssigned),
    }
}

/// Assigned missions are never deleted, whether or not they are complete.
pub fn validate_mission_deletion(mission: &Mission) -> Result<()> {
    match mission.cat_id {
        Some(_) => Err(LifecycleError::MissionAssignedToCat),
        None => Ok(()),
    }
}

/// Fold over a mission's targets: complete iff every target is complete.
pub fn mission_completion(targets: &[Target]) -> bool {
    !targets.is_empty() && targets.iter().all(|t| t.complete)
}

// ============================================================
// Targets
// ============================================================

/// Result of applying a patch to a target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetUpdate {
    pub target: Target,
    /// The mission's completion flag after the update.
    pub mission_complete: bool,
}

impl TargetUpdate {
    /// Whether this update is the one that completed the mission.
    pub fn completes_mission(&self, mission: &Mission) -> bool {
        self.mission_complete && !mission.complete
    }
}

/// Apply `patch` to `target`, re-deriving the mission flag when needed.
///
/// `mission_targets` are the mission's targets as currently stored (including
/// `target` itself). The mission flag is only recomputed when the patch sets
/// `complete` to true, and it never goes back to false.
pub fn apply_target_update(
    target: &Target,
    mission: &Mission,
    mission_targets: &[Target],
    patch: &UpdateTargetInput,
) -> Result<TargetUpdate> {
    if target.complete || mission.complete {
        return Err(LifecycleError::TargetOrMissionComplete);
    }

    let mut updated = target.clone();
    if let Some(notes) = &patch.notes {
        updated.notes = notes.clone();
    }
    if let Some(complete) = patch.complete {
        updated.complete = complete;
    }

    let mission_complete = if patch.complete == Some(true) {
        let targets: Vec<Target> = mission_targets
            .iter()
            .filter(|t| t.id != updated.id)
            .cloned()
            .chain(std::iter::once(updated.clone()))
            .collect();
        mission.complete || mission_completion(&targets)
    } else {
        mission.complete
    };

    Ok(TargetUpdate {
        target: updated,
        mission_complete,
    })
}
