//! Gemeinsamer Server-Zustand fuer den Transport
//!
//! Haelt Router, Audit-Log und Metriken als Arc-Referenzen, die sicher
//! zwischen tokio-Tasks geteilt werden koennen.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use palaver_auth::CredentialStore;
use palaver_chat::MessageRouter;
use palaver_core::AuditLog;
use palaver_observability::ChatMetriken;

/// Konfiguration fuer den Transport
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitige Verbindungen (angemeldet oder nicht)
    pub max_clients: usize,
    /// Maximale Laenge einer eingehenden Zeile in Bytes
    pub zeilenlimit_bytes: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_clients: 512,
            zeilenlimit_bytes: 4096,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState<C: CredentialStore + 'static> {
    pub config: SignalingConfig,
    pub router: Arc<MessageRouter<C>>,
    pub audit: Arc<dyn AuditLog>,
    pub metriken: ChatMetriken,
    aktive_verbindungen: AtomicUsize,
    start_time: Instant,
}

impl<C: CredentialStore + 'static> SignalingState<C> {
    pub fn neu(
        config: SignalingConfig,
        router: Arc<MessageRouter<C>>,
        audit: Arc<dyn AuditLog>,
        metriken: ChatMetriken,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            router,
            audit,
            metriken,
            aktive_verbindungen: AtomicUsize::new(0),
            start_time: Instant::now(),
        })
    }

    /// Reserviert einen Verbindungsplatz
    ///
    /// `None` wenn `max_clients` erreicht ist. Der Platz wird beim Drop des
    /// Guards wieder frei.
    pub fn platz_reservieren(self: &Arc<Self>) -> Option<VerbindungsPlatz<C>> {
        let max = self.config.max_clients;
        self.aktive_verbindungen
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |aktiv| {
                (aktiv < max).then_some(aktiv + 1)
            })
            .ok()
            .map(|_| VerbindungsPlatz {
                state: Arc::clone(self),
            })
    }

    pub fn aktive_verbindungen(&self) -> usize {
        self.aktive_verbindungen.load(Ordering::Acquire)
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Gauges auf den aktuellen Router-Zustand setzen
    pub fn metriken_aktualisieren(&self) {
        self.metriken
            .zustand_setzen(self.router.online_anzahl(), self.router.raum_anzahl());
    }
}

/// Belegter Verbindungsplatz
pub struct VerbindungsPlatz<C: CredentialStore + 'static> {
    state: Arc<SignalingState<C>>,
}

impl<C: CredentialStore + 'static> Drop for VerbindungsPlatz<C> {
    fn drop(&mut self) {
        self.state.aktive_verbindungen.fetch_sub(1, Ordering::AcqRel);
    }
}
