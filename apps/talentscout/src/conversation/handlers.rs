use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::conversation::intent::detect_exit;
use crate::conversation::machine::Reply;
use crate::conversation::session::{ConversationSession, SessionView};
use crate::conversation::stage::Stage;
use crate::conversation::store::SessionHandle;
use crate::errors::AppError;
use crate::state::AppState;
use crate::validation::MAX_INPUT_CHARS;

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub reply: Reply,
}

#[derive(Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

async fn find_session(state: &AppState, id: Uuid) -> Result<Arc<SessionHandle>, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let mut session = ConversationSession::new();
    let reply = state.machine.start(&mut session)?;
    let session_id = session.id();
    state.sessions.insert(session).await;
    Ok((StatusCode::CREATED, Json(CreateSessionResponse { session_id, reply })))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = find_session(&state, id).await?;
    let session = handle.session.lock().await;
    Ok(Json(session.view()))
}

/// POST /api/v1/sessions/:id/messages
pub async fn handle_post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<Reply>, AppError> {
    if req.text.chars().count() > MAX_INPUT_CHARS {
        return Err(AppError::Validation(format!(
            "Message must be at most {MAX_INPUT_CHARS} characters"
        )));
    }

    let handle = find_session(&state, id).await?;

    // An exit phrase must interrupt a turn that is still generating, so it
    // cancels before waiting for the lock.
    let exiting = detect_exit(&req.text);
    if exiting {
        handle.cancel.cancel();
    }

    let mut session = handle.session.lock().await;
    if exiting && session.stage() == Stage::Aborted {
        return Ok(Json(Reply::aborted()));
    }
    let reply = state.machine.handle_input(&mut session, &req.text).await?;
    Ok(Json(reply))
}

/// POST /api/v1/sessions/:id/retry-generation
pub async fn handle_retry_generation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reply>, AppError> {
    let handle = find_session(&state, id).await?;
    let mut session = handle.session.lock().await;
    let reply = state.machine.retry_generation(&mut session).await?;
    Ok(Json(reply))
}

/// POST /api/v1/sessions/:id/cancel
pub async fn handle_cancel_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Reply>, AppError> {
    let handle = find_session(&state, id).await?;
    handle.cancel.cancel();

    let mut session = handle.session.lock().await;
    if session.stage() == Stage::Aborted {
        return Ok(Json(Reply::aborted()));
    }
    let reply = state.machine.abort(&mut session)?;
    info!("Session {id} cancelled by host");
    Ok(Json(reply))
}
