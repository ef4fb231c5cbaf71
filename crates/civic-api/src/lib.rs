//! # civic-api: HTTP service for the citizen portal
//!
//! Stores citizen and service-request records with their sensitive fields
//! encrypted through the HSM, and serves them back decrypted. Public fields
//! stay in cleartext for filtering and analytics.
//!
//! ## API Surface
//!
//! | Route                                | Module                 |
//! |--------------------------------------|------------------------|
//! | `/v1/citizens`, `/v1/citizens/*`     | [`routes::records`]    |
//! | `/v1/service-requests/*`             | [`routes::records`]    |
//! | `/health/encryption`                 | [`routes::health`]     |
//! | `/health/liveness`, `/health/readiness` | this module         |

pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::Router;
use civic_fields::EntityKind;
use civic_hsm::HsmTransport;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the application router.
pub fn app<T: HsmTransport + 'static>(state: AppState<T>) -> Router {
    let api = Router::new()
        .merge(routes::records::router(EntityKind::Citizen))
        .merge(routes::records::router(EntityKind::ServiceRequest))
        .merge(routes::health::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let probes = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(probes).merge(api)
}

/// Liveness probe: 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. Stays ready when the HSM is down: reads degrade to
/// placeholders and `/health/encryption` reports the outage.
async fn readiness() -> &'static str {
    "ready"
}
