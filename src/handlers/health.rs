//! Liveness/readiness probes (SPEC_FULL A2 ambient stack).

use axum::extract::State;
use axum::http::StatusCode;
use std::sync::Arc;

use crate::AppState;

pub async fn health_check() -> &'static str {
    "OK"
}

/// Unlike `health_check`, actually exercises the database connection — a
/// pod that answers `health_check` but can't reach SQLite should not be
/// marked ready.
pub async fn ready_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (StatusCode::OK, "READY"),
        Err(e) => {
            tracing::error!(error = %e, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}
