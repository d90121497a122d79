//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task.
//!
//! ## Ablauf
//! ```text
//! Begruessung -> Wahl -> Username -> Passwort -> MessageRouter::anmelden
//!     |                                               |
//!     | (ungueltige Eingabe)                          v
//!     +-------------> Abbruch              Sitzungs-Schleife
//!                                                     |
//!                                     /quit, EOF, Fehler, Shutdown
//!                                                     v
//!                                        MessageRouter::trennen
//! ```
//!
//! In der Sitzungs-Schleife werden eingehende Zeilen und die Ausgangs-Queue
//! der Verbindung abwechselnd bedient.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use palaver_auth::CredentialStore;
use palaver_chat::{AblaufAktion, Anmeldeablauf, Anmeldung, ChatError, ClientSender};
use palaver_core::{AuditLevel, Username};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::{Framed, LinesCodec};

use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

type ZeilenStream = Framed<TcpStream, LinesCodec>;

/// Wie eine Sitzung geendet hat
#[derive(Debug)]
enum SitzungsEnde {
    /// `/quit` oder Sitzung nicht mehr registriert
    Beendet,
    /// Client hat die Verbindung geschlossen
    Getrennt,
    Shutdown,
    Fehler(SignalingError),
}

// ---------------------------------------------------------------------------
// ClientConnection
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne TCP-Verbindung
pub struct ClientConnection<C: CredentialStore + 'static> {
    state: Arc<SignalingState<C>>,
    peer_addr: SocketAddr,
}

impl<C: CredentialStore + 'static> ClientConnection<C> {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<SignalingState<C>>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitung
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal
    /// eingeht.
    pub async fn verarbeiten(self, stream: TcpStream, mut shutdown_rx: watch::Receiver<bool>) {
        let peer_addr = self.peer_addr;
        let limit = self.state.config.zeilenlimit_bytes;
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(limit));

        tracing::info!(peer = %peer_addr, "Neue Verbindung");
        self.state.audit.record(
            &format!("Connection opened from {peer_addr}"),
            AuditLevel::Info,
        );

        match self.anmeldung(&mut framed, &mut shutdown_rx).await {
            Ok(Some((username, rx))) => {
                self.sitzung(&mut framed, &username, rx, &mut shutdown_rx)
                    .await;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(peer = %peer_addr, fehler = %e, "Fehler waehrend der Anmeldung");
                self.transportfehler_melden(None, &e);
            }
        }

        self.state.audit.record(
            &format!("Connection closed from {peer_addr}"),
            AuditLevel::Info,
        );
        tracing::info!(peer = %peer_addr, "Verbindungs-Task beendet");
    }

    /// Treibt den Anmelde-Ablauf
    ///
    /// `Ok(None)` wenn die Verbindung ohne Sitzung endet (Abbruch, EOF,
    /// Shutdown, abgelehnte Zugangsdaten).
    async fn anmeldung(
        &self,
        framed: &mut ZeilenStream,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> SignalingResult<Option<(Username, mpsc::Receiver<String>)>> {
        let limit = self.state.config.zeilenlimit_bytes;
        let mut ablauf = Anmeldeablauf::neu();
        framed
            .send(ablauf.begruessung())
            .await
            .map_err(|e| SignalingError::aus_codec(e, limit))?;

        loop {
            let zeile = tokio::select! {
                eingang = framed.next() => match eingang {
                    Some(Ok(zeile)) => zeile,
                    Some(Err(e)) => return Err(SignalingError::aus_codec(e, limit)),
                    None => {
                        tracing::debug!(peer = %self.peer_addr, phase = ?ablauf.phase(), "Verbindung vor Anmeldung geschlossen");
                        return Ok(None);
                    }
                },
                _ = shutdown_abwarten(shutdown_rx) => return Ok(None),
            };

            match ablauf.eingabe(&zeile) {
                AblaufAktion::Antwort(text) => {
                    framed
                        .send(text)
                        .await
                        .map_err(|e| SignalingError::aus_codec(e, limit))?;
                }
                AblaufAktion::Abbruch(text) => {
                    tracing::debug!(peer = %self.peer_addr, grund = text, "Anmeldung abgebrochen");
                    framed
                        .send(text)
                        .await
                        .map_err(|e| SignalingError::aus_codec(e, limit))?;
                    return Ok(None);
                }
                AblaufAktion::Pruefen(daten) => {
                    let (sender, rx) = ClientSender::kanal();
                    return match self.state.router.anmelden(daten, sender).await {
                        Ok(Anmeldung { username, bilanz }) => {
                            ablauf.abschliessen(true);
                            self.state
                                .metriken
                                .zustellung_erfassen(bilanz.zugestellt, bilanz.verworfen);
                            self.state.metriken_aktualisieren();
                            Ok(Some((username, rx)))
                        }
                        Err(fehler) => {
                            ablauf.abschliessen(false);
                            self.state.metriken.auth_failures_total.inc();
                            framed
                                .send(fehler.to_string())
                                .await
                                .map_err(|e| SignalingError::aus_codec(e, limit))?;
                            Ok(None)
                        }
                    };
                }
            }
        }
    }

    /// Sitzungs-Schleife eines angemeldeten Clients, endet mit Teardown
    async fn sitzung(
        &self,
        framed: &mut ZeilenStream,
        username: &Username,
        mut rx: mpsc::Receiver<String>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        let limit = self.state.config.zeilenlimit_bytes;
        let router = &self.state.router;

        let ende = loop {
            tokio::select! {
                // Eingehende Zeile vom Client
                eingang = framed.next() => match eingang {
                    Some(Ok(zeile)) => {
                        let ergebnis = router.verarbeiten(username, &zeile);
                        self.state.metriken.befehl_erfassen(
                            ergebnis.befehl,
                            ergebnis.zugestellt,
                            ergebnis.verworfen,
                        );
                        self.state.metriken_aktualisieren();
                        if ergebnis.beenden {
                            break SitzungsEnde::Beendet;
                        }
                    }
                    Some(Err(e)) => break SitzungsEnde::Fehler(SignalingError::aus_codec(e, limit)),
                    None => break SitzungsEnde::Getrennt,
                },

                // Ausgehende Zeile aus der eigenen Queue
                Some(zeile) = rx.recv() => {
                    if let Err(e) = framed.send(zeile).await {
                        break SitzungsEnde::Fehler(SignalingError::aus_codec(e, limit));
                    }
                }

                // Shutdown-Signal
                _ = shutdown_abwarten(shutdown_rx) => break SitzungsEnde::Shutdown,
            }
        };

        match &ende {
            SitzungsEnde::Fehler(e) => {
                tracing::warn!(username = %username, fehler = %e, "Sitzung mit Fehler beendet");
                self.transportfehler_melden(Some(username), e);
            }
            anderes => {
                tracing::debug!(username = %username, ende = ?anderes, "Sitzung beendet");
            }
        }

        if let Some(bilanz) = router.trennen(username) {
            self.state
                .metriken
                .zustellung_erfassen(bilanz.zugestellt, bilanz.verworfen);
        }
        self.state.metriken_aktualisieren();

        // Bereits eingereihte Zeilen (z.B. "Goodbye!") noch ausliefern
        if !matches!(ende, SitzungsEnde::Fehler(_)) {
            while let Ok(zeile) = rx.try_recv() {
                if framed.send(zeile).await.is_err() {
                    break;
                }
            }
        }
    }

    fn transportfehler_melden(&self, username: Option<&Username>, fehler: &SignalingError) {
        let fehler = ChatError::transport(fehler.to_string());
        let wer = match username {
            Some(u) => format!("'{u}'"),
            None => self.peer_addr.to_string(),
        };
        self.state.audit.record(
            &format!("Session of {wer} ended: {fehler}"),
            fehler.audit_level(),
        );
    }
}

/// Wartet bis das Shutdown-Signal `true` ist
///
/// Ist der Sender weg, wartet die Funktion fuer immer.
pub(crate) async fn shutdown_abwarten(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_signal_wird_erkannt() {
        let (tx, mut rx) = watch::channel(false);
        let warten = tokio::spawn(async move { shutdown_abwarten(&mut rx).await });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), warten)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn geschlossener_sender_ist_kein_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let ergebnis =
            tokio::time::timeout(Duration::from_millis(50), shutdown_abwarten(&mut rx)).await;
        assert!(ergebnis.is_err());
    }

    #[tokio::test]
    async fn bereits_gesetztes_signal() {
        let (_tx, mut rx) = watch::channel(true);
        tokio::time::timeout(Duration::from_secs(1), shutdown_abwarten(&mut rx))
            .await
            .unwrap();
    }
}
