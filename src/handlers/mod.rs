//! HTTP surface: axum router, shared state, and per-endpoint handlers.

mod challenge;
mod health;
mod payouts;
mod status;
mod submit_proof;
mod withdraw;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::FaucetConfig;
use crate::engine::BlockEngine;
use crate::error::AppError;
use crate::ratelimit::RateLimiter;
use crate::storage::Storage;

pub struct AppState {
    pub engine: Arc<BlockEngine>,
    pub storage: Arc<dyn Storage>,
    pub config: FaucetConfig,
    pub rate_limiter_general: RateLimiter,
    pub rate_limiter_submit: RateLimiter,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Arc<BlockEngine>, storage: Arc<dyn Storage>, config: FaucetConfig) -> Self {
        let rate_limiter_general = RateLimiter::new(config.rate_limit_general);
        let rate_limiter_submit = RateLimiter::new(config.rate_limit_submit);
        Self {
            engine,
            storage,
            config,
            rate_limiter_general,
            rate_limiter_submit,
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/challenge", get(challenge::challenge))
        .route("/submit-proof", post(submit_proof::submit_proof))
        .route("/status", get(status::status))
        .route("/withdraw-request", post(withdraw::withdraw_request))
        .route("/payouts", get(payouts::payouts))
        .route("/health", get(health::health))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            general_rate_limit,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Applies the general-traffic rate limit ahead of every route. The tighter
/// submission-specific limit is checked inside the `/submit-proof` handler.
async fn general_rate_limit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !state.rate_limiter_general.check(&addr.ip().to_string()) {
        return AppError::policy(
            "Rate limit exceeded",
            axum::http::StatusCode::TOO_MANY_REQUESTS,
        )
        .into_response();
    }
    next.run(request).await
}
