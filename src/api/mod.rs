use anyhow::Result;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::Duration;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod dto;
pub mod handlers;
pub mod middleware;

use crate::config::AppConfig;
use crate::security::audit_log::AuditLogger;
use crate::security::rate_limit::RateLimiter;
use crate::security::signature::SignatureGate;
use crate::security::token::TokenService;
use crate::store::UserStore;

pub type SharedState = Arc<AppState>;

/// Everything a request handler can reach. Secrets are injected here once
/// at startup; the store is behind a trait so tests can swap it out.
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub signature: SignatureGate,
    pub tokens: TokenService,
    pub limiter: RateLimiter,
    pub audit: AuditLogger,
}

impl AppState {
    pub fn new(config: &AppConfig, store: Arc<dyn UserStore>) -> Self {
        Self {
            store,
            signature: SignatureGate::new(config.signature_key.clone()),
            tokens: TokenService::new(
                &config.jwt_secret,
                Duration::minutes(config.jwt_ttl_minutes),
            ),
            limiter: RateLimiter::per_window_secs(
                config.rate_limit.max_requests,
                config.rate_limit.window_secs,
            ),
            audit: AuditLogger::new(),
        }
    }
}

/// Assembles the request pipeline.
///
/// Layer nesting fixes the stage order: signature gate outermost (cheapest,
/// rejects forged callers before they consume limiter budget), then
/// admission control, then bearer auth on protected routes only.
/// `/health` sits outside the pipeline entirely.
pub fn create_router(state: SharedState) -> Router {
    let protected = Router::new()
        .route("/user", get(handlers::current_user))
        .route("/update", put(handlers::update_user))
        .route("/{id}", get(handlers::get_user))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let public = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login));

    let api = Router::new()
        .nest("/api/v1/auth", protected.merge(public))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::admission,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::verify_service_signature,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: SharedState, port: u16) -> Result<()> {
    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
