//! HTTP route handlers for the party API.
//!
//! All handlers are thin - they delegate to the session store.

use axum::{
    extract::{Path, Query, State},
    http::{header, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::response::{api_ok, api_success};
use crate::api::RelayState;
use crate::error::{TandemError, TandemResult};
use crate::protocol_constants::SERVICE_ID;
use crate::sync::{AddTrackRequest, PushAck, SessionState, SessionStore, VoteTally};

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateQuery {
    session_id: String,
    host_id: String,
}

#[derive(Deserialize)]
struct HostQuery {
    host_id: String,
}

#[derive(Deserialize)]
struct VoteQuery {
    user_id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: RelayState) -> Router {
    // Browsers on the LAN talk to the relay directly.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/party/create", post(create_session))
        .route(
            "/api/party/{id}",
            get(get_session).delete(end_session),
        )
        .route("/api/party/{id}/sync", post(sync_session))
        .route("/api/party/{id}/add", post(add_track))
        .route("/api/party/{id}/vote", post(vote_skip))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe.
async fn health_check(State(state): State<RelayState>) -> impl IntoResponse {
    api_success(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "sessions": state.store.len(),
    }))
}

async fn create_session(
    State(state): State<RelayState>,
    Query(query): Query<CreateQuery>,
) -> TandemResult<Json<SessionState>> {
    if query.session_id.trim().is_empty() || query.host_id.is_empty() {
        return Err(TandemError::InvalidRequest(
            "session_id and host_id are required".into(),
        ));
    }
    let created = state
        .store
        .create_session(&query.session_id, &query.host_id)
        .await?;
    log::info!("[Relay] Created session {}", query.session_id);
    Ok(Json(created))
}

async fn get_session(
    State(state): State<RelayState>,
    Path(id): Path<String>,
) -> TandemResult<Json<SessionState>> {
    Ok(Json(state.store.get_session_state(&id).await?))
}

async fn sync_session(
    State(state): State<RelayState>,
    Path(id): Path<String>,
    Query(query): Query<HostQuery>,
    Json(body): Json<SessionState>,
) -> TandemResult<Json<PushAck>> {
    if body.session_id != id {
        return Err(TandemError::InvalidRequest(format!(
            "body is for session {}, not {}",
            body.session_id, id
        )));
    }
    let ack = state
        .store
        .push_session_state(&id, &query.host_id, &body)
        .await?;
    Ok(Json(ack))
}

async fn end_session(
    State(state): State<RelayState>,
    Path(id): Path<String>,
    Query(query): Query<HostQuery>,
) -> TandemResult<impl IntoResponse> {
    state.store.end_session(&id, &query.host_id).await?;
    log::info!("[Relay] Ended session {}", id);
    Ok(api_ok())
}

async fn add_track(
    State(state): State<RelayState>,
    Path(id): Path<String>,
    Json(body): Json<AddTrackRequest>,
) -> TandemResult<impl IntoResponse> {
    if body.action != "add" {
        return Err(TandemError::InvalidRequest(format!(
            "unsupported action '{}'",
            body.action
        )));
    }
    let Some(track) = body.track else {
        return Err(TandemError::InvalidRequest("track is required".into()));
    };
    state.store.add_track(&id, &track).await?;
    log::debug!("[Relay] Contribution '{}' queued for {}", track.title, id);
    Ok(api_ok())
}

async fn vote_skip(
    State(state): State<RelayState>,
    Path(id): Path<String>,
    Query(query): Query<VoteQuery>,
) -> TandemResult<Json<VoteTally>> {
    Ok(Json(state.store.vote_skip(&id, &query.user_id).await?))
}
