// Web server: Axum-based admin API for community policy and reputation reads.
//
// Everything under /api/* serves JSON and requires the admin bearer token.
// /health is public so a load balancer can poll it.

use std::sync::Arc;

use anyhow::Result;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::moderation::ThresholdPolicy;
use crate::reputation::rank::RankQuery;
use crate::reputation::store::ScoreStore;

pub mod auth;
pub mod handlers;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub policy: ThresholdPolicy,
    pub scores: ScoreStore,
    pub ranks: RankQuery,
    pub admin_token: Arc<str>,
}

impl AppState {
    pub fn new(db: Arc<dyn Database>, admin_token: &str) -> Self {
        let scores = ScoreStore::new(db.clone());
        Self {
            policy: ThresholdPolicy::new(db.clone()),
            ranks: RankQuery::new(scores.clone()),
            scores,
            db,
            admin_token: Arc::from(admin_token),
        }
    }
}

/// Start the Axum web server and block until it exits.
pub async fn run_server(config: Config, db: Arc<dyn Database>, port: u16, bind: &str) -> Result<()> {
    config.require_admin_token()?;
    let state = AppState::new(db, &config.admin_token);

    let app = build_router(state);

    let addr = format!("{bind}:{port}");
    info!("Mannerly admin API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let protected_api = Router::new()
        .route(
            "/api/communities/{id}/policy",
            get(handlers::policy::get_policy),
        )
        .route(
            "/api/communities/{id}/policy/delete",
            put(handlers::policy::set_delete),
        )
        .route(
            "/api/communities/{id}/policy/react",
            put(handlers::policy::set_react),
        )
        .route(
            "/api/communities/{id}/policy/log-channel",
            put(handlers::policy::set_log_channel).delete(handlers::policy::clear_log_channel),
        )
        .route("/api/users/{id}/karma", get(handlers::karma::get_karma))
        .route("/api/leaderboard", get(handlers::karma::get_leaderboard))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    let public_api = Router::new().route("/health", get(health));

    Router::new()
        .merge(protected_api)
        .merge(public_api)
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check: 200 when storage answers, 503 when it doesn't.
async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> Response {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            axum::Json(serde_json::json!({ "status": "ok" })),
        )
            .into_response(),
        Err(e) => {
            let detail = format!("{e:#}");
            tracing::warn!(error = %detail, "Health check failed");
            api_error(StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
        }
    }
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
}
