// Community policy handlers.
//
// GET    /api/communities/{id}/policy              resolved thresholds + log channel
// PUT    /api/communities/{id}/policy/delete       {"value": 0-100}
// PUT    /api/communities/{id}/policy/react        {"value": 0-100}
// PUT    /api/communities/{id}/policy/log-channel  {"channel_id": "..."}
// DELETE /api/communities/{id}/policy/log-channel
//
// Every write answers with the updated policy so the caller sees the
// effective values without a second request.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::error_response;
use crate::error::{ModerationError, Result};
use crate::moderation::Threshold;
use crate::web::AppState;

#[derive(Deserialize)]
pub struct ThresholdBody {
    /// A whole number, or a string such as "65" or "65%".
    pub value: serde_json::Value,
}

#[derive(Deserialize)]
pub struct LogChannelBody {
    pub channel_id: String,
}

/// Parse the loosely-typed request value into a validated threshold.
fn parse_threshold(value: &serde_json::Value) -> Result<Threshold> {
    match value {
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(v) => Threshold::new(v),
            None => Err(ModerationError::InvalidThreshold {
                input: n.to_string(),
            }),
        },
        serde_json::Value::String(s) => s.parse(),
        other => Err(ModerationError::InvalidThreshold {
            input: other.to_string(),
        }),
    }
}

async fn respond_with_policy(state: &AppState, community_id: &str) -> Response {
    match state.policy.snapshot(community_id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /api/communities/{id}/policy
pub async fn get_policy(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    respond_with_policy(&state, &id).await
}

/// PUT /api/communities/{id}/policy/delete
pub async fn set_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ThresholdBody>,
) -> Response {
    let threshold = match parse_threshold(&body.value) {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = state.policy.set_delete_threshold(&id, threshold).await {
        return error_response(&e);
    }
    respond_with_policy(&state, &id).await
}

/// PUT /api/communities/{id}/policy/react
pub async fn set_react(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ThresholdBody>,
) -> Response {
    let threshold = match parse_threshold(&body.value) {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = state.policy.set_react_threshold(&id, threshold).await {
        return error_response(&e);
    }
    respond_with_policy(&state, &id).await
}

/// PUT /api/communities/{id}/policy/log-channel
pub async fn set_log_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<LogChannelBody>,
) -> Response {
    if let Err(e) = state.policy.set_log_destination(&id, &body.channel_id).await {
        return error_response(&e);
    }
    respond_with_policy(&state, &id).await
}

/// DELETE /api/communities/{id}/policy/log-channel
pub async fn clear_log_channel(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if let Err(e) = state.policy.clear_log_destination(&id).await {
        return error_response(&e);
    }
    respond_with_policy(&state, &id).await
}
