use std::path::PathBuf;

use super::state::{AppState, CallEntry};
use crate::audio::AudioSource;
use crate::call::{CallConfig, CallHandle, CallSessionController, CallState};
use crate::error::CallError;
use crate::coach::{build_system_prompt, Persona, ProductContext};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartCallRequest {
    /// Customer to role-play; builds the system prompt when none is given
    pub persona: Option<Persona>,

    pub product: Option<ProductContext>,

    /// Explicit system instruction, overrides persona/product
    pub system_prompt: Option<String>,

    /// WAV file to stream instead of the microphone
    pub input: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct StartCallResponse {
    pub call_id: String,
    pub state: CallState,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MuteRequest {
    /// Desired mute flag; toggles when absent
    pub muted: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub call_id: String,
    pub state: CallState,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn not_found(call_id: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("Call {} not found", call_id))
}

fn command_error(e: CallError) -> Response {
    let status = match e {
        CallError::State { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

async fn find_call(state: &AppState, call_id: &str) -> Option<CallHandle> {
    let calls = state.calls.read().await;
    calls.get(call_id).map(|entry| entry.handle.clone())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /calls
/// Start a new practice call
pub async fn start_call(
    State(state): State<AppState>,
    body: Option<Json<StartCallRequest>>,
) -> Response {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let system_prompt = match (req.system_prompt, req.persona) {
        (Some(prompt), _) => prompt,
        (None, Some(persona)) => build_system_prompt(&persona, &req.product.unwrap_or_default()),
        (None, None) => String::new(),
    };
    let source = match req.input {
        Some(path) => AudioSource::File(path),
        None => AudioSource::Microphone { device: None },
    };

    let config = CallConfig::from_app(&state.config, system_prompt);
    let call_id = config.session_id.clone();
    info!("Starting call {} from {:?}", call_id, source);

    let (controller, handle) = CallSessionController::new(config, (state.backends)(source));
    let task = tokio::spawn(controller.run());

    let call_state = match handle.start().await {
        Ok(call_state) => call_state,
        Err(e) => {
            error!("Failed to start call {}: {}", call_id, e);
            task.abort();
            return command_error(e);
        }
    };

    {
        let mut calls = state.calls.write().await;
        calls.insert(call_id.clone(), CallEntry { handle, task });
    }

    (
        StatusCode::OK,
        Json(StartCallResponse {
            call_id,
            state: call_state,
        }),
    )
        .into_response()
}

/// POST /calls/:call_id/mute
/// Set the mute flag, or toggle it when the body omits `muted`
pub async fn mute_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    body: Option<Json<MuteRequest>>,
) -> Response {
    let Some(handle) = find_call(&state, &call_id).await else {
        return not_found(&call_id);
    };

    let result = match body.and_then(|Json(req)| req.muted) {
        Some(muted) => handle.set_muted(muted).await,
        None => handle.toggle_mute().await,
    };
    if let Err(e) = result {
        return command_error(e);
    }

    match handle.snapshot().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => command_error(e),
    }
}

/// POST /calls/:call_id/retry
/// Reconnect a call that is in `error`
pub async fn retry_call(State(state): State<AppState>, Path(call_id): Path<String>) -> Response {
    let Some(handle) = find_call(&state, &call_id).await else {
        return not_found(&call_id);
    };

    match handle.retry().await {
        Ok(call_state) => (
            StatusCode::OK,
            Json(StateResponse {
                call_id,
                state: call_state,
            }),
        )
            .into_response(),
        Err(e) => command_error(e),
    }
}

/// POST /calls/:call_id/hangup
/// End a call and return its transcript and stats
pub async fn hangup_call(State(state): State<AppState>, Path(call_id): Path<String>) -> Response {
    let entry = {
        let mut calls = state.calls.write().await;
        calls.remove(&call_id)
    };
    let Some(CallEntry { handle, task }) = entry else {
        return not_found(&call_id);
    };

    if let Err(e) = handle.hangup().await {
        warn!("Hangup of call {} reported: {}", call_id, e);
    }
    drop(handle);

    match task.await {
        Ok(outcome) => {
            info!("Call {} ended", call_id);
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(e) => {
            error!("Call {} task failed: {}", call_id, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Call {} failed: {}", call_id, e),
            )
        }
    }
}

/// GET /calls/:call_id/status
pub async fn get_call_status(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Response {
    let Some(handle) = find_call(&state, &call_id).await else {
        return not_found(&call_id);
    };

    match handle.snapshot().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => command_error(e),
    }
}

/// GET /calls/:call_id/transcript
/// Transcript accumulated so far
pub async fn get_call_transcript(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Response {
    let Some(handle) = find_call(&state, &call_id).await else {
        return not_found(&call_id);
    };

    match handle.snapshot().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot.transcript)).into_response(),
        Err(e) => command_error(e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
