//! Liveness and readiness probes.
//!
//! `/healthz` never touches the providers. `/readyz` asks both of them:
//! a HEAD on the default bucket and a one-item queue listing.

use crate::{AppState, services::error::ServiceResult};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct Probe {
    status: &'static str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    checks: BTreeMap<&'static str, Check>,
}

#[derive(Serialize)]
struct Check {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<ServiceResult<()>> for Check {
    fn from(result: ServiceResult<()>) -> Self {
        Self {
            ok: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        }
    }
}

/// `GET /healthz`
pub async fn healthz() -> impl IntoResponse {
    Json(Probe {
        status: "ok",
        checks: BTreeMap::new(),
    })
}

/// `GET /readyz`: 200 when the bucket and the queue service both answer,
/// 503 otherwise. The body lists each check.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let (object_store, queue) =
        tokio::join!(state.storage.check_ready(), state.queues.check_ready());

    let checks = BTreeMap::from([
        ("object_store", Check::from(object_store)),
        ("queue", Check::from(queue)),
    ]);
    let ready = checks.values().all(|check| check.ok);

    let (code, status) = if ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "error")
    };
    (code, Json(Probe { status, checks }))
}
