// REST surface: session creation/lookup and health reporting.
//
// Payload field names are camelCase; they are part of the browser
// client's contract, including the literal `{error, sessionId}` shape of
// the session-lookup 404.

use crate::config::ServerConfig;
use crate::error::{ApiError, ErrorCode};
use crate::store::SessionStore;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use codepair_common::language::{Language, ALL_LANGUAGES};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    store: SessionStore,
    config: ServerConfig,
    started_at: Instant,
}

impl ApiState {
    pub fn new(store: SessionStore, config: ServerConfig) -> Self {
        Self { store, config, started_at: Instant::now() }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{session_id}", get(get_session))
        .route("/api/health", get(health))
        .with_state(state)
}

/// JSON body for the 404 fallback — unknown endpoints answer with an
/// explicit error envelope rather than an empty body.
pub async fn not_found() -> ApiError {
    ApiError::new(ErrorCode::NotFound, "the requested endpoint does not exist")
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Wire name of the session language; defaults to javascript.
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub language: Language,
    pub share_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetailsResponse {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub language: Language,
    pub user_count: usize,
    pub exists: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Whole seconds since process start.
    pub uptime: u64,
    pub active_sessions: usize,
    pub total_users: usize,
}

pub async fn create_session(
    State(state): State<ApiState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Response {
    let language = match payload.language.as_deref() {
        None => Language::default(),
        Some(raw) => match raw.parse::<Language>() {
            Ok(language) => language,
            Err(parse_error) => {
                let supported: Vec<&str> =
                    ALL_LANGUAGES.iter().map(|l| l.as_str()).collect();
                return ApiError::new(ErrorCode::ValidationFailed, parse_error.to_string())
                    .with_details(json!({ "supported": supported }))
                    .into_response();
            }
        },
    };

    let session = state.store.create(language).await;
    info!(session_id = %session.id, language = %language, "session created");

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id,
            created_at: session.created_at,
            language,
            share_url: state.config.share_url(session.id),
        }),
    )
        .into_response()
}

pub async fn get_session(
    State(state): State<ApiState>,
    Path(session_id): Path<Uuid>,
) -> Response {
    let Some(session) = state.store.get(session_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Session not found", "sessionId": session_id })),
        )
            .into_response();
    };

    Json(SessionDetailsResponse {
        session_id: session.id,
        created_at: session.created_at,
        last_activity: session.last_activity_at,
        language: session.language,
        user_count: session.participants.len(),
        exists: true,
    })
    .into_response()
}

pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let stats = state.store.stats().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        uptime: state.started_at.elapsed().as_secs(),
        active_sessions: stats.session_count,
        total_users: stats.participant_count,
    })
}
