//! `GET /health/encryption`: the encryption service's health report.
//!
//! 200 when healthy or deliberately disabled, 503 when the HSM session
//! cannot be established.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use civic_hsm::{HealthStatus, HsmTransport};

use crate::state::AppState;

pub fn router<T: HsmTransport + 'static>() -> Router<AppState<T>> {
    Router::new().route("/health/encryption", get(encryption_health::<T>))
}

async fn encryption_health<T: HsmTransport + 'static>(
    State(state): State<AppState<T>>,
) -> (StatusCode, Json<HealthStatus>) {
    let status = state.encryption.health_check().await;
    let code = if status.is_serving() {
        StatusCode::OK
    } else {
        tracing::warn!(error = ?status.error, "encryption health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}
