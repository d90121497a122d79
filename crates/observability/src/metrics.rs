//! Prometheus-kompatible Metriken fuer palaver
//!
//! Registrierte Metriken:
//! - `palaver_sessions_online` – Gauge: Angemeldete Sitzungen
//! - `palaver_rooms_active` – Gauge: Existierende Raeume
//! - `palaver_connections_total` – Counter: Angenommene TCP-Verbindungen
//! - `palaver_commands_total` – Counter: Verarbeitete Zeilen (command)
//! - `palaver_deliveries_total` – Counter: Zugestellte Zeilen
//! - `palaver_deliveries_dropped_total` – Counter: Verworfene Zeilen
//! - `palaver_auth_failures_total` – Counter: Gescheiterte Anmeldungen

use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle palaver-Prometheus-Metriken
#[derive(Clone)]
pub struct ChatMetriken {
    pub registry: Arc<Registry>,

    pub sessions_online: IntGauge,
    pub rooms_active: IntGauge,
    pub connections_total: IntCounter,
    pub commands_total: IntCounterVec,
    pub deliveries_total: IntCounter,
    pub deliveries_dropped_total: IntCounter,
    pub auth_failures_total: IntCounter,
}

impl ChatMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let sessions_online = IntGauge::with_opts(Opts::new(
            "palaver_sessions_online",
            "Anzahl angemeldeter Sitzungen",
        ))?;
        registry.register(Box::new(sessions_online.clone()))?;

        let rooms_active = IntGauge::with_opts(Opts::new(
            "palaver_rooms_active",
            "Anzahl existierender Raeume",
        ))?;
        registry.register(Box::new(rooms_active.clone()))?;

        let connections_total = IntCounter::with_opts(Opts::new(
            "palaver_connections_total",
            "Gesamtanzahl angenommener TCP-Verbindungen",
        ))?;
        registry.register(Box::new(connections_total.clone()))?;

        let commands_total = IntCounterVec::new(
            Opts::new("palaver_commands_total", "Verarbeitete Zeilen nach Befehl"),
            &["command"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let deliveries_total = IntCounter::with_opts(Opts::new(
            "palaver_deliveries_total",
            "Zugestellte ausgehende Zeilen",
        ))?;
        registry.register(Box::new(deliveries_total.clone()))?;

        let deliveries_dropped_total = IntCounter::with_opts(Opts::new(
            "palaver_deliveries_dropped_total",
            "Verworfene ausgehende Zeilen (Queue voll oder Empfaenger weg)",
        ))?;
        registry.register(Box::new(deliveries_dropped_total.clone()))?;

        let auth_failures_total = IntCounter::with_opts(Opts::new(
            "palaver_auth_failures_total",
            "Gescheiterte Registrierungen und Logins",
        ))?;
        registry.register(Box::new(auth_failures_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            sessions_online,
            rooms_active,
            connections_total,
            commands_total,
            deliveries_total,
            deliveries_dropped_total,
            auth_failures_total,
        })
    }

    /// Erfasst eine verarbeitete Zeile
    pub fn befehl_erfassen(&self, befehl: &str, zugestellt: usize, verworfen: usize) {
        self.commands_total.with_label_values(&[befehl]).inc();
        self.zustellung_erfassen(zugestellt, verworfen);
    }

    /// Erfasst Zustellungen ausserhalb eines Befehls (Join- und Abschiedshinweise)
    pub fn zustellung_erfassen(&self, zugestellt: usize, verworfen: usize) {
        self.deliveries_total.inc_by(zugestellt as u64);
        self.deliveries_dropped_total.inc_by(verworfen as u64);
    }

    /// Setzt die Zustands-Gauges
    pub fn zustand_setzen(&self, sessions: usize, raeume: usize) {
        self.sessions_online.set(sessions as i64);
        self.rooms_active.set(raeume as i64);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: ChatMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(
    axum::extract::State(metriken): axum::extract::State<ChatMetriken>,
) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = ChatMetriken::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn zustand_setzen() {
        let metriken = ChatMetriken::neu().unwrap();
        metriken.zustand_setzen(3, 2);
        assert_eq!(metriken.sessions_online.get(), 3);
        assert_eq!(metriken.rooms_active.get(), 2);
    }

    #[test]
    fn befehl_erfassen_zaehlt() {
        let metriken = ChatMetriken::neu().unwrap();
        metriken.befehl_erfassen("join", 2, 0);
        metriken.befehl_erfassen("join", 1, 1);
        metriken.befehl_erfassen("text", 5, 0);

        assert_eq!(metriken.commands_total.with_label_values(&["join"]).get(), 2);
        assert_eq!(metriken.deliveries_total.get(), 8);
        assert_eq!(metriken.deliveries_dropped_total.get(), 1);
    }

    #[test]
    fn zustellung_ohne_befehl_zaehlt_nur_zustellungen() {
        let metriken = ChatMetriken::neu().unwrap();
        metriken.zustellung_erfassen(3, 1);

        assert_eq!(metriken.deliveries_total.get(), 3);
        assert_eq!(metriken.deliveries_dropped_total.get(), 1);
        assert_eq!(metriken.commands_total.with_label_values(&["join"]).get(), 0);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = ChatMetriken::neu().unwrap();
        metriken.sessions_online.set(5);
        metriken.befehl_erfassen("list", 1, 0);

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("palaver_sessions_online 5"));
        assert!(output.contains("palaver_commands_total{command=\"list\"} 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }
}
