use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use super::extract::{JsonBody, Path, Query};
use super::AppState;
use crate::lifecycle::{self, ErrorKind, LifecycleError};
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

/// Error returned to API clients as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn not_found(what: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: format!("{} not found", what),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        let status = match e.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation | ErrorKind::StateConflict => StatusCode::BAD_REQUEST,
        };
        tracing::warn!("Rejected request: {}", e);
        Self {
            status,
            detail: e.to_string(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        let status = match &rejection {
            PathRejection::FailedToDeserializePathParams(_) => StatusCode::NOT_FOUND,
            other => other.status(),
        };
        Self {
            status,
            detail: rejection.body_text(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

/// Map a store error to a response.
///
/// Rule violations carried through `anyhow` keep their message and status.
/// Anything else is logged in full and reported to the client as a generic
/// 500 so storage details don't leak.
fn internal_error(e: anyhow::Error) -> ApiError {
    match e.downcast::<LifecycleError>() {
        Ok(rule) => rule.into(),
        Err(e) => {
            tracing::error!("Internal error: {:#}", e);
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: "Internal server error".to_string(),
            }
        }
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Cats
// ============================================================

pub async fn list_cats(State(state): State<AppState>) -> Result<Json<Vec<Cat>>, ApiError> {
    state.db.get_all_cats().map(Json).map_err(internal_error)
}

pub async fn get_cat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Cat>, ApiError> {
    state
        .db
        .get_cat(id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Spy cat"))
}

pub async fn create_cat(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CreateCatInput>,
) -> Result<(StatusCode, Json<Cat>), ApiError> {
    // Breed lookup goes over the network, so it runs before the store is touched.
    lifecycle::validate_cat_creation(state.breeds.as_ref(), &input.breed).await?;

    let cat = state.db.create_cat(input).map_err(internal_error)?;
    tracing::info!("Hired cat {} ({})", cat.name, cat.id);
    Ok((StatusCode::CREATED, Json(cat)))
}

pub async fn update_cat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(input): JsonBody<UpdateCatInput>,
) -> Result<Json<Cat>, ApiError> {
    state
        .db
        .update_cat(id, input)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Spy cat"))
}

pub async fn delete_cat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.db.delete_cat(id).map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_cat_missions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MissionWithTargets>>, ApiError> {
    state
        .db
        .get_cat(id)
        .map_err(internal_error)?
        .ok_or_else(|| ApiError::not_found("Spy cat"))?;

    state
        .db
        .get_missions_by_cat(id)
        .map(Json)
        .map_err(internal_error)
}

// ============================================================
// Missions
// ============================================================

pub async fn list_missions(
    State(state): State<AppState>,
    Query(filter): Query<MissionFilter>,
) -> Result<Json<Vec<MissionWithTargets>>, ApiError> {
    state
        .db
        .get_all_missions(&filter)
        .map(Json)
        .map_err(internal_error)
}

pub async fn get_mission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MissionWithTargets>, ApiError> {
    state
        .db
        .get_mission(id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Mission"))
}

pub async fn create_mission(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CreateMissionInput>,
) -> Result<(StatusCode, Json<MissionWithTargets>), ApiError> {
    state
        .db
        .create_mission(input)
        .map(|m| (StatusCode::CREATED, Json(m)))
        .map_err(internal_error)
}

pub async fn delete_mission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.db.delete_mission(id).map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_cat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(input): JsonBody<AssignCatInput>,
) -> Result<Json<MissionWithTargets>, ApiError> {
    state
        .db
        .assign_cat(id, input.cat_id)
        .map(Json)
        .map_err(internal_error)
}

pub async fn unassign_cat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MissionWithTargets>, ApiError> {
    state
        .db
        .unassign_cat(id)
        .map(Json)
        .map_err(internal_error)
}

pub async fn list_mission_targets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Target>>, ApiError> {
    state
        .db
        .get_mission(id)
        .map_err(internal_error)?
        .ok_or_else(|| ApiError::not_found("Mission"))?;

    state
        .db
        .get_targets_by_mission(id)
        .map(Json)
        .map_err(internal_error)
}

// ============================================================
// Targets
// ============================================================

pub async fn get_target(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Target>, ApiError> {
    state
        .db
        .get_target(id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Target"))
}

pub async fn update_target(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(input): JsonBody<UpdateTargetInput>,
) -> Result<Json<Target>, ApiError> {
    state
        .db
        .update_target(id, input)
        .map(Json)
        .map_err(internal_error)
}
