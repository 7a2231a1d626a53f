//! Session endpoints.
//!
//! A session owns the forecast cache that keeps repeated lookups stable.
//! Clients create one and pass its id to the forecast endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, ErrorResponse};
use crate::services::sessions::SessionRegistry;

/// A client session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Session UUID, used in forecast paths
    pub session_id: Uuid,
    /// When the session was created (ISO 8601)
    pub created_at: String,
    /// Number of forecasts resolved so far in this session
    pub cached_forecasts: usize,
}

/// Start a new session with an empty forecast cache.
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "Sessions",
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
    )
)]
pub async fn create_session(
    State(sessions): State<SessionRegistry>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let id = sessions.create().await;
    let response = describe(&sessions, id).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Get a session's metadata.
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{session_id}",
    tag = "Sessions",
    params(
        ("session_id" = Uuid, Path, description = "Session UUID"),
    ),
    responses(
        (status = 200, description = "Session metadata", body = SessionResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
pub async fn get_session(
    State(sessions): State<SessionRegistry>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(describe(&sessions, session_id).await?))
}

async fn describe(sessions: &SessionRegistry, id: Uuid) -> Result<SessionResponse, AppError> {
    let (created_at, cached_forecasts) = sessions
        .describe(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))?;
    Ok(SessionResponse {
        session_id: id,
        created_at: created_at.to_rfc3339(),
        cached_forecasts,
    })
}
