//! Health-Check-Endpunkt fuer palaver
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime, angemeldeten Sitzungen und
//! dem Zustand des Audit-Schreibers

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use prometheus::IntGauge;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
///
/// `Degraded` heisst: Chat laeuft, aber der Audit-Schreiber ist ausgefallen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub sessions_online: i64,
    pub audit_ok: bool,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    pub audit_ok: Arc<AtomicBool>,
    pub sessions_online: IntGauge,
}

impl HealthState {
    pub fn neu(audit_ok: Arc<AtomicBool>, sessions_online: IntGauge) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            audit_ok,
            sessions_online,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn audit_gesund(&self) -> bool {
        self.audit_ok.load(Ordering::Relaxed)
    }

    pub fn antwort(&self) -> HealthResponse {
        let audit_ok = self.audit_gesund();
        HealthResponse {
            status: if audit_ok {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            sessions_online: self.sessions_online.get(),
            audit_ok,
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Serverstatus zurueck
///
/// Antwortet immer mit 200, solange der Prozess Anfragen bedient; der
/// Zustand steht im Body.
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.antwort()))
}
