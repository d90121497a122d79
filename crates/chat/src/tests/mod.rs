//! Router-Tests mit In-Memory-Zugangsdaten und echten mpsc-Queues


use std::sync::Arc;

use palaver_auth::{HashParameter, InMemoryCredentialStore};
use palaver_core::{AuditLevel, AuditLog, Username};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::login::{Anmeldedaten, Wahl};
use crate::registry::ClientSender;
use crate::router::{ChatEinstellungen, MessageRouter};

pub(crate) const GUENSTIG: HashParameter = HashParameter {
    speicher_kib: 8,
    iterationen: 1,
};

pub(crate) type TestRouter = Arc<MessageRouter<InMemoryCredentialStore>>;

/// Sammelt Audit-Eintraege fuer Assertions
#[derive(Default)]
pub(crate) struct SammelAudit {
    eintraege: Mutex<Vec<(String, AuditLevel)>>,
}

impl SammelAudit {
    pub(crate) fn enthaelt(&self, teil: &str) -> bool {
        self.eintraege.lock().iter().any(|(e, _)| e.contains(teil))
    }

    pub(crate) fn level_von(&self, teil: &str) -> Option<AuditLevel> {
        self.eintraege
            .lock()
            .iter()
            .find(|(e, _)| e.contains(teil))
            .map(|(_, l)| *l)
    }
}

impl AuditLog for SammelAudit {
    fn record(&self, ereignis: &str, level: AuditLevel) {
        self.eintraege.lock().push((ereignis.to_string(), level));
    }
}

pub(crate) fn name(s: &str) -> Username {
    Username::parse(s).expect("gueltiger Testname")
}

pub(crate) fn router_mit(einstellungen: ChatEinstellungen) -> (TestRouter, Arc<SammelAudit>) {
    let audit = Arc::new(SammelAudit::default());
    let store = Arc::new(InMemoryCredentialStore::neu(GUENSTIG));
    let router = MessageRouter::neu(store, audit.clone(), einstellungen);
    (router, audit)
}

pub(crate) fn router() -> (TestRouter, Arc<SammelAudit>) {
    router_mit(ChatEinstellungen::default())
}

/// Ein angemeldeter Test-Client
pub(crate) struct Client {
    pub name: Username,
    pub rx: mpsc::Receiver<String>,
}

impl Client {
    /// Alle bisher zugestellten Zeilen abholen
    pub(crate) fn zeilen(&mut self) -> Vec<String> {
        let mut zeilen = Vec::new();
        while let Ok(z) = self.rx.try_recv() {
            zeilen.push(z);
        }
        zeilen
    }
}

pub(crate) async fn registrieren(router: &TestRouter, n: &str) -> Client {
    let (sender, rx) = ClientSender::kanal();
    let daten = Anmeldedaten {
        wahl: Wahl::Registrieren,
        username: name(n),
        passwort: format!("pw-{n}"),
    };
    let anmeldung = router
        .anmelden(daten, sender)
        .await
        .expect("Registrierung fehlgeschlagen");
    Client {
        name: anmeldung.username,
        rx,
    }
}

/// Registriert mehrere Clients und leert danach alle Queues
pub(crate) async fn clients(router: &TestRouter, namen: &[&str]) -> Vec<Client> {
    let mut alle = Vec::new();
    for n in namen {
        alle.push(registrieren(router, n).await);
    }
    for c in &mut alle {
        c.zeilen();
    }
    alle
}
