//! Liveness and readiness endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub const SERVICE_NAME: &str = "pensionserver";

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<bool>,
}

impl HealthReport {
    fn new(status: &'static str, database: Option<bool>) -> Self {
        Self {
            status,
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            database,
        }
    }
}

/// Readiness: a pooled connection must be obtainable.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let pool = state.conn.clone();
    let db_ok = tokio::task::spawn_blocking(move || pool.get().is_ok())
        .await
        .unwrap_or(false);

    if db_ok {
        (StatusCode::OK, Json(HealthReport::new("healthy", Some(true))))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthReport::new("degraded", Some(false))),
        )
    }
}

pub async fn health_check_simple() -> Json<HealthReport> {
    Json(HealthReport::new("ok", None))
}
