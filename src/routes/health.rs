//! Health check endpoints
//!
//! - /health, /healthz - Liveness probe (is the service running?)
//! - /ready, /readyz   - Readiness probe (can the store answer queries?)

use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use super::common::{json_response, FullBody};
use crate::server::AppState;

/// Liveness body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall health status (true if service is running)
    pub healthy: bool,
    /// Service version
    pub version: &'static str,
    /// Storage backend: "mongodb" or "memory"
    pub store: &'static str,
    /// Seconds since the server started
    pub uptime: u64,
    pub mode: &'static str,
    pub node_id: String,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        store: state.store.backend(),
        uptime: state.started_at.elapsed().as_secs(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        node_id: state.args.node_id.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// Liveness probe
pub fn health_check(state: Arc<AppState>) -> Response<FullBody> {
    json_response(StatusCode::OK, &build_health_response(&state))
}

/// Readiness probe; a cheap store round trip
pub async fn readiness_check(state: Arc<AppState>) -> Response<FullBody> {
    match state.store.stats().await {
        Ok(_) => json_response(
            StatusCode::OK,
            &ReadinessResponse {
                ready: true,
                error: None,
            },
        ),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                &ReadinessResponse {
                    ready: false,
                    error: Some("Store unavailable".into()),
                },
            )
        }
    }
}
