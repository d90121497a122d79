//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `ChatServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer
//! `ClientConnection`. Laufende Sitzungen werden beim Shutdown nicht
//! abgewartet.

use std::net::SocketAddr;
use std::sync::Arc;

use palaver_auth::CredentialStore;
use palaver_core::AuditLevel;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::connection::{shutdown_abwarten, ClientConnection};
use crate::error::SignalingResult;
use crate::server_state::SignalingState;

/// TCP-Chat-Server
pub struct ChatServer<C: CredentialStore + 'static> {
    state: Arc<SignalingState<C>>,
}

impl<C: CredentialStore + 'static> ChatServer<C> {
    /// Erstellt einen neuen ChatServer
    pub fn neu(state: Arc<SignalingState<C>>) -> Self {
        Self { state }
    }

    /// Bindet `bind_addr` und akzeptiert Verbindungen
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt.
    pub async fn starten(
        self,
        bind_addr: SocketAddr,
        shutdown_rx: watch::Receiver<bool>,
    ) -> SignalingResult<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        self.starten_mit_listener(listener, shutdown_rx).await
    }

    /// Accept-Loop auf einem bereits gebundenen Listener
    pub async fn starten_mit_listener(
        self,
        listener: TcpListener,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> SignalingResult<()> {
        let lokale_addr = listener.local_addr()?;

        tracing::info!(adresse = %lokale_addr, "TCP Chat-Server gestartet");
        self.state.audit.record(
            &format!("Server started on {lokale_addr}"),
            AuditLevel::Info,
        );

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let Some(platz) = self.state.platz_reservieren() else {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = self.state.config.max_clients,
                                    "Server voll – Verbindung abgelehnt"
                                );
                                self.state.audit.record(
                                    &format!("Connection from {peer_addr} rejected: server full"),
                                    AuditLevel::Warn,
                                );
                                drop(stream);
                                continue;
                            };

                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");
                            self.state.metriken.connections_total.inc();

                            let verbindung = ClientConnection::neu(
                                Arc::clone(&self.state),
                                peer_addr,
                            );
                            let shutdown_rx_clone = shutdown_rx.clone();

                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                                drop(platz);
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                _ = shutdown_abwarten(&mut shutdown_rx) => {
                    tracing::info!("Chat-Server: Shutdown-Signal empfangen");
                    break;
                }
            }
        }

        tracing::info!(
            uptime_sek = self.state.uptime_sek(),
            verbindungen = self.state.aktive_verbindungen(),
            "TCP Chat-Server gestoppt"
        );
        self.state
            .audit
            .record("Server shutting down.", AuditLevel::Info);
        Ok(())
    }
}
