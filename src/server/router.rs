//! HTTP router for regauth
//!
//! Wires the token endpoint and the health check onto the shared
//! application state. All business logic lives in the handler module; the
//! router itself stays a thin dispatch layer.

use std::sync::Arc;
use std::time::Duration;

use axum::{response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::server::handler::auth_handler;
use crate::token::Signer;
use crate::vault::VaultClient;

/// Shared application state
///
/// Everything here is read-only after startup, so one clone per request is
/// just reference bumps.
#[derive(Clone)]
pub struct AppState {
    /// Token signer loaded at startup
    pub signer: Arc<Signer>,

    /// Credential store client with its shared transport
    pub vault: Arc<VaultClient>,

    /// Deadline for one token request
    pub handler_timeout: Duration,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/auth", get(auth_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Health check endpoint handler, for load-balancer probes
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
