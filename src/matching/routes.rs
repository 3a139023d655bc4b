//! REST endpoints for compatibility scoring and listings.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use super::date_range::DateRange;
use super::listing::{ListingKind, NewListing};
use super::rank::rank_candidates;
use super::score::{ScoreInput, score};
use crate::store::Database;

/// Shared state for matching routes.
#[derive(Clone)]
pub struct MatchingRouteState {
    pub db: Arc<dyn Database>,
}

/// Build the compatibility and listing REST routes.
pub fn matching_routes(state: MatchingRouteState) -> Router {
    Router::new()
        .route("/api/compatibility", post(compatibility))
        .route("/api/listings", post(create_listing).get(list_listings))
        .route("/api/listings/matches", get(list_matches))
        .route("/api/listings/{id}", get(get_listing))
        .with_state(state)
}

fn bad_request(message: impl std::fmt::Display) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": message.to_string()})),
    )
        .into_response()
}

fn storage_failure(error: impl std::fmt::Display) -> Response {
    warn!(error = %error, "Listing storage failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "Storage unavailable"})),
    )
        .into_response()
}

fn parse_kind(raw: Option<&str>) -> Result<Option<ListingKind>, Response> {
    raw.filter(|k| !k.is_empty())
        .map(|k| k.parse::<ListingKind>())
        .transpose()
        .map_err(bad_request)
}

/// POST /api/compatibility
///
/// Accepts `{"percentage": n}` or `{"reference": {..}, "candidate": {..}}`.
/// The body is decoded here rather than by the extractor so an inverted
/// range answers 400 like every other scoring error.
async fn compatibility(Json(body): Json<Value>) -> Response {
    let input: ScoreInput = match serde_json::from_value(body) {
        Ok(input) => input,
        Err(e) => return bad_request(format!("Invalid compatibility request: {e}")),
    };
    match score(&input) {
        Ok(result) => Json(json!(result)).into_response(),
        Err(e) => bad_request(e),
    }
}

/// POST /api/listings
async fn create_listing(
    State(state): State<MatchingRouteState>,
    Json(body): Json<Value>,
) -> Response {
    let new: NewListing = match serde_json::from_value(body) {
        Ok(new) => new,
        Err(e) => return bad_request(format!("Invalid listing: {e}")),
    };
    if let Err(message) = new.validate() {
        return bad_request(message);
    }

    let listing = new.into_listing();
    if let Err(e) = state.db.insert_listing(&listing).await {
        return storage_failure(e);
    }
    info!(listing_id = %listing.id, kind = %listing.kind, "Listing published");
    (StatusCode::CREATED, Json(json!(listing))).into_response()
}

#[derive(Deserialize)]
struct KindQuery {
    kind: Option<String>,
}

/// GET /api/listings?kind=
async fn list_listings(
    State(state): State<MatchingRouteState>,
    Query(query): Query<KindQuery>,
) -> Response {
    let kind = match parse_kind(query.kind.as_deref()) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };
    match state.db.list_listings(kind).await {
        Ok(listings) => Json(json!(listings)).into_response(),
        Err(e) => storage_failure(e),
    }
}

/// GET /api/listings/{id}
async fn get_listing(
    State(state): State<MatchingRouteState>,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return bad_request("Invalid listing ID");
    };
    match state.db.get_listing(id).await {
        Ok(Some(listing)) => Json(json!(listing)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Listing not found"})),
        )
            .into_response(),
        Err(e) => storage_failure(e),
    }
}

#[derive(Deserialize)]
struct MatchQuery {
    start: NaiveDate,
    end: NaiveDate,
    kind: Option<String>,
}

/// GET /api/listings/matches?start=&end=&kind=
///
/// Ranks listings by how much of `start..end` they cover.
async fn list_matches(
    State(state): State<MatchingRouteState>,
    Query(query): Query<MatchQuery>,
) -> Response {
    let reference = match DateRange::new(query.start, query.end) {
        Ok(range) => range,
        Err(e) => return bad_request(e),
    };
    let kind = match parse_kind(query.kind.as_deref()) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };
    let listings = match state.db.list_listings(kind).await {
        Ok(listings) => listings,
        Err(e) => return storage_failure(e),
    };
    match rank_candidates(&reference, listings) {
        Ok(ranked) => Json(json!(ranked)).into_response(),
        Err(e) => bad_request(e),
    }
}
