//! Session-Registry – Identitaet -> Verbindungs-Handle
//!
//! Pro Identitaet ist hoechstens eine Sitzung registriert. Der Handle ist das
//! Sende-Ende der Ausgangs-Queue einer Verbindung; Zustellung ist
//! nicht-blockierend und verwirft bei voller oder geschlossener Queue.

use std::collections::BTreeMap;

use palaver_core::{PresenceStatus, Username};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::Ausgang;

/// Groesse der Ausgangs-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 256;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Ausgangs-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub session_id: Uuid,
    tx: mpsc::Sender<String>,
}

impl ClientSender {
    pub fn neu(tx: mpsc::Sender<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            tx,
        }
    }

    /// Erstellt Handle und zugehoerige Empfangs-Queue
    pub fn kanal() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        (Self::neu(tx), rx)
    }

    /// Sendet eine Zeile nicht-blockierend
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, zeile: String) -> bool {
        match self.tx.try_send(zeile) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(session_id = %self.session_id, "Send-Queue voll – Zeile verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(session_id = %self.session_id, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterErgebnis {
    Ok,
    AlreadyLoggedIn,
}

#[derive(Debug)]
struct SessionEintrag {
    sender: ClientSender,
    status: PresenceStatus,
}

/// Ergebnis einer Zustellrunde
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ZustellBilanz {
    pub zugestellt: usize,
    pub verworfen: usize,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<Username, SessionEintrag>,
}

impl SessionRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Sitzung; eine bestehende Sitzung bleibt unangetastet
    pub fn register(&mut self, identitaet: &Username, sender: ClientSender) -> RegisterErgebnis {
        if self.sessions.contains_key(identitaet) {
            return RegisterErgebnis::AlreadyLoggedIn;
        }
        tracing::info!(
            username = %identitaet,
            session_id = %sender.session_id,
            "Sitzung registriert"
        );
        self.sessions.insert(
            identitaet.clone(),
            SessionEintrag {
                sender,
                status: PresenceStatus::Online,
            },
        );
        RegisterErgebnis::Ok
    }

    /// Entfernt Sitzung und Praesenz; idempotent
    pub fn unregister(&mut self, identitaet: &Username) -> bool {
        let entfernt = self.sessions.remove(identitaet).is_some();
        if entfernt {
            tracing::info!(username = %identitaet, "Sitzung entfernt");
        }
        entfernt
    }

    pub fn lookup(&self, identitaet: &Username) -> Option<&ClientSender> {
        self.sessions.get(identitaet).map(|e| &e.sender)
    }

    pub fn ist_online(&self, identitaet: &Username) -> bool {
        self.sessions.contains_key(identitaet)
    }

    pub fn status(&self, identitaet: &Username) -> Option<PresenceStatus> {
        self.sessions.get(identitaet).map(|e| e.status)
    }

    /// Setzt den Praesenz-Status und benachrichtigt alle anderen Sitzungen
    ///
    /// Gibt `false` zurueck wenn keine Sitzung existiert.
    pub fn set_status(
        &mut self,
        identitaet: &Username,
        status: PresenceStatus,
        ausgang: &mut Ausgang,
    ) -> bool {
        let Some(eintrag) = self.sessions.get_mut(identitaet) else {
            return false;
        };
        eintrag.status = status;

        let hinweis = format!("Notification: User '{identitaet}' status: {status}");
        for andere in self.sessions.keys().filter(|u| *u != identitaet) {
            ausgang.an(andere, hinweis.clone());
        }
        true
    }

    /// Geordnete Momentaufnahme aller Sitzungen
    pub fn all_handles(&self) -> Vec<(Username, ClientSender)> {
        self.sessions
            .iter()
            .map(|(u, e)| (u.clone(), e.sender.clone()))
            .collect()
    }

    /// Namen aller Online-Identitaeten (sortiert)
    pub fn namen(&self) -> impl Iterator<Item = &Username> {
        self.sessions.keys()
    }

    pub fn anzahl(&self) -> usize {
        self.sessions.len()
    }

    /// Stellt alle gesammelten Zeilen zu
    ///
    /// Fehlt die Sitzung eines Empfaengers oder ist seine Queue voll, wird nur
    /// diese Zeile verworfen.
    pub fn zustellen(&self, ausgang: Ausgang) -> ZustellBilanz {
        let mut bilanz = ZustellBilanz::default();
        for zustellung in ausgang {
            let ok = match self.sessions.get(&zustellung.empfaenger) {
                Some(eintrag) => eintrag.sender.senden(zustellung.text),
                None => {
                    tracing::debug!(
                        empfaenger = %zustellung.empfaenger,
                        "Empfaenger nicht mehr online – Zeile verworfen"
                    );
                    false
                }
            };
            if ok {
                bilanz.zugestellt += 1;
            } else {
                bilanz.verworfen += 1;
            }
        }
        bilanz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Username {
        Username::parse(s).unwrap()
    }

    #[test]
    fn zweite_registrierung_abgelehnt_erste_bleibt() {
        let mut reg = SessionRegistry::neu();
        let a = name("a");
        let (erster, _rx1) = ClientSender::kanal();
        let erste_id = erster.session_id;
        let (zweiter, _rx2) = ClientSender::kanal();

        assert_eq!(reg.register(&a, erster), RegisterErgebnis::Ok);
        assert_eq!(reg.register(&a, zweiter), RegisterErgebnis::AlreadyLoggedIn);
        assert_eq!(reg.lookup(&a).map(|s| s.session_id), Some(erste_id));
        assert_eq!(reg.anzahl(), 1);
    }

    #[test]
    fn unregister_ist_idempotent() {
        let mut reg = SessionRegistry::neu();
        let a = name("a");
        let (tx, _rx) = ClientSender::kanal();
        reg.register(&a, tx);

        assert!(reg.unregister(&a));
        assert!(!reg.unregister(&a));
        assert!(reg.lookup(&a).is_none());
        assert!(reg.status(&a).is_none());
    }

    #[test]
    fn status_benachrichtigt_alle_anderen() {
        let mut reg = SessionRegistry::neu();
        let (a, b, c) = (name("a"), name("b"), name("c"));
        for u in [&a, &b, &c] {
            let (tx, _rx) = ClientSender::kanal();
            reg.register(u, tx);
        }

        let mut aus = Ausgang::default();
        assert!(reg.set_status(&a, PresenceStatus::DoNotDisturb, &mut aus));
        assert_eq!(reg.status(&a), Some(PresenceStatus::DoNotDisturb));
        assert_eq!(aus.len(), 2);
        assert_eq!(
            aus.fuer("b").collect::<Vec<_>>(),
            vec!["Notification: User 'a' status: Do Not Disturb"]
        );
        assert_eq!(aus.fuer("a").count(), 0);

        assert!(!reg.set_status(&name("z"), PresenceStatus::Busy, &mut aus));
    }

    #[test]
    fn all_handles_ist_sortiert() {
        let mut reg = SessionRegistry::neu();
        for n in ["zoe", "anna", "mia"] {
            let (tx, _rx) = ClientSender::kanal();
            reg.register(&name(n), tx);
        }
        let namen: Vec<_> = reg.all_handles().into_iter().map(|(u, _)| u.to_string()).collect();
        assert_eq!(namen, vec!["anna", "mia", "zoe"]);
    }

    #[tokio::test]
    async fn zustellen_verwirft_nur_betroffene() {
        let mut reg = SessionRegistry::neu();
        let (a, b) = (name("a"), name("b"));
        let (tx_a, mut rx_a) = ClientSender::kanal();
        let (tx_b, rx_b) = ClientSender::kanal();
        reg.register(&a, tx_a);
        reg.register(&b, tx_b);
        // b's Verbindung ist weg
        drop(rx_b);

        let mut aus = Ausgang::default();
        aus.an(&b, "verloren");
        aus.an(&a, "hallo");
        aus.an(&name("offline"), "niemand");

        let bilanz = reg.zustellen(aus);
        assert_eq!(bilanz, ZustellBilanz { zugestellt: 1, verworfen: 2 });
        assert_eq!(rx_a.recv().await.as_deref(), Some("hallo"));
    }

    #[test]
    fn volle_queue_verwirft() {
        let (tx, _rx) = mpsc::channel(1);
        let sender = ClientSender::neu(tx);
        assert!(sender.senden("eins".into()));
        assert!(!sender.senden("zwei".into()));
    }
}
