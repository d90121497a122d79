//! palaver-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config::ServerConfig;
use palaver_auth::FileCredentialStore;
use palaver_chat::MessageRouter;
use palaver_core::AuditLog;
use palaver_observability::{
    observability_server_starten, ChatMetriken, FileAuditLog, HealthState, TracingAuditLog,
};
use palaver_signaling::{ChatServer, SignalingState};
use tokio::sync::watch;

/// Wartezeit fuer das Leeren der Audit-Queue beim Beenden
const AUDIT_NACHLAUF: Duration = Duration::from_millis(500);

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => tracing::error!(fehler = %e, "Ctrl-C-Handler nicht installierbar"),
            }
        });

        self.laufen(shutdown_rx).await
    }

    /// Startet alle Subsysteme und laeuft bis `shutdown_rx` `true` wird
    ///
    /// Reihenfolge:
    /// 1. Audit-Log oeffnen
    /// 2. Benutzerdatei laden
    /// 3. Router und Metriken aufbauen
    /// 4. Observability-Server starten (optional)
    /// 5. TCP-Listener starten
    pub async fn laufen(self, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let config = self.config;

        tracing::info!(
            server_name = %config.server.name,
            tcp = %config.tcp_bind_adresse(),
            max_clients = config.server.max_clients,
            "Server startet"
        );

        let (audit, audit_ok, audit_task) = match &config.logging.audit_datei {
            Some(pfad) => {
                let (log, task) = FileAuditLog::oeffnen(pfad).await?;
                let ok = log.gesund_flag();
                tracing::info!(pfad = %pfad, "Audit-Datei geoeffnet");
                (Arc::new(log) as Arc<dyn AuditLog>, ok, Some(task))
            }
            None => (
                Arc::new(TracingAuditLog) as Arc<dyn AuditLog>,
                Arc::new(AtomicBool::new(true)),
                None,
            ),
        };

        let store = FileCredentialStore::oeffnen(
            config.auth.benutzer_datei.as_str(),
            config.hash_parameter(),
        )
        .await
        .with_context(|| {
            format!(
                "Benutzerdatei '{}' nicht nutzbar",
                config.auth.benutzer_datei
            )
        })?;

        let router = MessageRouter::neu(
            Arc::new(store),
            Arc::clone(&audit),
            config.chat_einstellungen(),
        );
        let metriken = ChatMetriken::neu()?;
        let state = SignalingState::neu(
            config.signaling_config(),
            router,
            audit,
            metriken.clone(),
        );

        if config.observability.aktiviert {
            let addr: SocketAddr = config
                .observability_bind_adresse()
                .parse()
                .context("Ungueltige Observability-Adresse")?;
            let health = HealthState::neu(audit_ok, metriken.sessions_online.clone());
            tokio::spawn(async move {
                if let Err(e) = observability_server_starten(addr, metriken, health).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });
        }

        let bind_addr: SocketAddr = config
            .tcp_bind_adresse()
            .parse()
            .context("Ungueltige TCP-Adresse")?;
        ChatServer::neu(state).starten(bind_addr, shutdown_rx).await?;

        // Offene Sitzungen halten das Audit-Log noch; nur kurz nachlaufen
        if let Some(task) = audit_task {
            if tokio::time::timeout(AUDIT_NACHLAUF, task).await.is_err() {
                tracing::debug!("Audit-Queue beim Beenden nicht vollstaendig geleert");
            }
        }

        tracing::info!("Server beendet");
        Ok(())
    }
}
