//! REST endpoints for onboarding sessions and finished profiles.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use uuid::Uuid;

use super::manager::OnboardingManager;
use super::model::ProfileUpdate;
use crate::error::{OnboardingError, SubmissionError};

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub manager: Arc<OnboardingManager>,
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding", post(create_session))
        .route(
            "/api/onboarding/{id}",
            get(get_session).patch(update_session).delete(discard_session),
        )
        .route("/api/onboarding/{id}/advance", post(advance_session))
        .route("/api/onboarding/{id}/retreat", post(retreat_session))
        .route("/api/profiles/{account_id}", get(get_profile))
        .with_state(state)
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": format!("Invalid {what} ID")})),
        )
            .into_response()
    })
}

fn session_error(err: OnboardingError) -> Response {
    let status = match err {
        OnboardingError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        OnboardingError::NotFinished { .. } | OnboardingError::Finished => StatusCode::CONFLICT,
    };
    (status, Json(json!({"error": err.to_string()}))).into_response()
}

/// POST /api/onboarding
async fn create_session(State(state): State<OnboardingRouteState>) -> Response {
    let view = state.manager.create_session().await;
    (StatusCode::CREATED, Json(json!(view))).into_response()
}

/// GET /api/onboarding/{id}
async fn get_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id, "session") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.manager.view(id).await {
        Ok(view) => Json(json!(view)).into_response(),
        Err(e) => session_error(e),
    }
}

/// PATCH /api/onboarding/{id}
///
/// Body is a partial profile; fields left out are untouched. Decoded by
/// hand so a malformed field answers with a JSON 400.
async fn update_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let id = match parse_id(&id, "session") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let update: ProfileUpdate = match serde_json::from_value(body) {
        Ok(update) => update,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("Invalid profile update: {e}")})),
            )
                .into_response();
        }
    };
    match state.manager.update(id, update).await {
        Ok(view) => Json(json!(view)).into_response(),
        Err(e) => session_error(e),
    }
}

/// POST /api/onboarding/{id}/advance
///
/// Responds with the session view. When the advance submitted the
/// profile, the created account or the submission error is included and
/// a failure picks the status code.
async fn advance_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id, "session") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let outcome = match state.manager.advance(id).await {
        Ok(outcome) => outcome,
        Err(e) => return session_error(e),
    };

    match outcome.submission {
        None => Json(json!({"session": outcome.session})).into_response(),
        Some(Ok(account)) => Json(json!({
            "session": outcome.session,
            "account": account,
        }))
        .into_response(),
        Some(Err(err)) => {
            let status = match err {
                SubmissionError::AccountExists => StatusCode::CONFLICT,
                SubmissionError::AccountFailed(_) | SubmissionError::ProfileNotSaved { .. } => {
                    StatusCode::BAD_GATEWAY
                }
            };
            (
                status,
                Json(json!({
                    "session": outcome.session,
                    "error": err.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// POST /api/onboarding/{id}/retreat
async fn retreat_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id, "session") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.manager.retreat(id).await {
        Ok(view) => Json(json!(view)).into_response(),
        Err(e) => session_error(e),
    }
}

/// DELETE /api/onboarding/{id}
async fn discard_session(
    State(state): State<OnboardingRouteState>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id, "session") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.manager.discard(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => session_error(e),
    }
}

/// GET /api/profiles/{account_id}
async fn get_profile(
    State(state): State<OnboardingRouteState>,
    Path(account_id): Path<String>,
) -> Response {
    let account_id = match parse_id(&account_id, "account") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.manager.stored_profile(account_id).await {
        Ok(Some(profile)) => Json(json!(profile)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No profile exists for this account"})),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(%account_id, error = %e, "Failed to load profile");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to load profile"})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::store::LibSqlBackend;

    async fn app() -> Router {
        let backend = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let manager = Arc::new(OnboardingManager::new(backend.clone(), backend));
        onboarding_routes(OnboardingRouteState { manager })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn create_then_fetch_session() {
        let app = app().await;
        let (status, created) = send(&app, "POST", "/api/onboarding", None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["step"], "identity");
        assert_eq!(created["step_complete"], true);

        let id = created["id"].as_str().unwrap();
        let (status, fetched) = send(&app, "GET", &format!("/api/onboarding/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["id"], created["id"]);
    }

    #[tokio::test]
    async fn invalid_and_unknown_ids() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/api/onboarding/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid session ID");

        let missing = Uuid::new_v4();
        let (status, _) = send(&app, "GET", &format!("/api/onboarding/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "GET", &format!("/api/profiles/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patch_then_advance_and_retreat() {
        let app = app().await;
        let (_, created) = send(&app, "POST", "/api/onboarding", None).await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "POST", &format!("/api/onboarding/{id}/advance"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["step"], "schedule");

        // Only a start date: the step holds and says why.
        let (status, view) = send(
            &app,
            "PATCH",
            &format!("/api/onboarding/{id}"),
            Some(json!({"start_date": "2025-09-01"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["missing"], json!(["end date is required"]));
        let (_, body) = send(&app, "POST", &format!("/api/onboarding/{id}/advance"), None).await;
        assert_eq!(body["session"]["step"], "schedule");

        send(
            &app,
            "PATCH",
            &format!("/api/onboarding/{id}"),
            Some(json!({"end_date": "2025-12-20"})),
        )
        .await;
        let (_, body) = send(&app, "POST", &format!("/api/onboarding/{id}/advance"), None).await;
        assert_eq!(body["session"]["step"], "preferences");

        let (_, view) = send(&app, "POST", &format!("/api/onboarding/{id}/retreat"), None).await;
        assert_eq!(view["step"], "schedule");
        assert_eq!(view["profile"]["end_date"], "2025-12-20");
    }

    #[tokio::test]
    async fn malformed_patch_is_json_bad_request() {
        let app = app().await;
        let (_, created) = send(&app, "POST", "/api/onboarding", None).await;
        let id = created["id"].as_str().unwrap();

        for body in [
            json!({"favourite_colour": "blue"}),
            json!({"cleanliness": 9}),
            json!({"start_date": "next week"}),
        ] {
            let (status, resp) =
                send(&app, "PATCH", &format!("/api/onboarding/{id}"), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(
                resp["error"]
                    .as_str()
                    .unwrap()
                    .starts_with("Invalid profile update")
            );
        }
    }

    #[test]
    fn finished_session_maps_to_conflict() {
        let resp = session_error(OnboardingError::Finished);
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let resp = session_error(OnboardingError::SessionNotFound(Uuid::new_v4()));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_discards_session() {
        let app = app().await;
        let (_, created) = send(&app, "POST", "/api/onboarding", None).await;
        let id = created["id"].as_str().unwrap();

        let (status, _) = send(&app, "DELETE", &format!("/api/onboarding/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &format!("/api/onboarding/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
