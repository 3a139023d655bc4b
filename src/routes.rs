//! Router assembly: health check plus the onboarding and matching APIs.

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::accounts::IdentityProvider;
use crate::matching::{MatchingRouteState, matching_routes};
use crate::onboarding::{OnboardingManager, OnboardingRouteState, onboarding_routes};
use crate::store::Database;

/// Everything the HTTP layer needs.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<OnboardingManager>,
    pub db: Arc<dyn Database>,
}

impl AppState {
    pub fn new(identity: Arc<dyn IdentityProvider>, db: Arc<dyn Database>) -> Self {
        Self {
            manager: Arc::new(OnboardingManager::new(identity, Arc::clone(&db))),
            db,
        }
    }
}

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .merge(onboarding_routes(OnboardingRouteState {
            manager: state.manager,
        }))
        .merge(matching_routes(MatchingRouteState { db: state.db }))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "studyswap"
    }))
}
