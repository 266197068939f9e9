// Reputation read handlers.
//
// GET /api/users/{id}/karma     karma card, 404 when the user has no record
// GET /api/leaderboard?limit=N  top N users by manners score (default 10, max 100)

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::error_response;
use crate::reputation::karma;
use crate::web::{api_error, AppState};

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

#[derive(Deserialize, Default)]
pub struct LeaderboardQuery {
    pub limit: Option<u32>,
}

/// GET /api/users/{id}/karma
pub async fn get_karma(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match karma(&state.scores, &id).await {
        Ok(Some(card)) => Json(card).into_response(),
        Ok(None) => api_error(StatusCode::NOT_FOUND, "No messages recorded for this user"),
        Err(e) => error_response(&e),
    }
}

/// GET /api/leaderboard
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardQuery>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    match state.ranks.leaderboard(limit).await {
        Ok(entries) => Json(serde_json::json!({
            "limit": limit,
            "entries": entries,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}
