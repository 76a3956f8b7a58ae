mod extract;
mod handlers;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    normalize_path::NormalizePath,
    trace::TraceLayer,
};

use crate::breeds::BreedClassifier;
use crate::config::Config;
use crate::db::Database;

pub use handlers::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub breeds: Arc<dyn BreedClassifier>,
}

/// Build the router with default settings (CORS for the local frontend only).
pub fn create_router(db: Database, breeds: Arc<dyn BreedClassifier>) -> Router {
    create_router_with_config(db, breeds, &Config::default())
}

pub fn create_router_with_config(
    db: Database,
    breeds: Arc<dyn BreedClassifier>,
    config: &Config,
) -> Router {
    let api = Router::new()
        // Cats
        .route("/cats", get(handlers::list_cats))
        .route("/cats", post(handlers::create_cat))
        .route("/cats/{id}", get(handlers::get_cat))
        .route("/cats/{id}", put(handlers::update_cat))
        .route("/cats/{id}", delete(handlers::delete_cat))
        .route("/cats/{id}/missions", get(handlers::list_cat_missions))
        // Missions
        .route("/missions", get(handlers::list_missions))
        .route("/missions", post(handlers::create_mission))
        .route("/missions/{id}", get(handlers::get_mission))
        .route("/missions/{id}", delete(handlers::delete_mission))
        .route("/missions/{id}/assign", put(handlers::assign_cat))
        .route("/missions/{id}/assign", delete(handlers::unassign_cat))
        .route("/missions/{id}/targets", get(handlers::list_mission_targets))
        // Targets
        .route("/targets/{id}", get(handlers::get_target))
        .route("/targets/{id}", put(handlers::update_target))
        // Health
        .route("/health", get(handlers::health));

    // Resources answer at the root and under `/api/v1`.
    let routes: Router = api
        .clone()
        .nest("/api/v1", api)
        .with_state(AppState { db, breeds });

    // Trailing slashes are trimmed before routing, so `/cats/` reaches `/cats`.
    Router::new()
        .fallback_service(NormalizePath::trim_trailing_slash(routes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.cors_origins)),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS allows any origin");
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}
