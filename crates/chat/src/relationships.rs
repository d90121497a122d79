//! Stumm- und Blocklisten pro Identitaet
//!
//! Kanten sind gerichtet: `block(a, b)` traegt `b` in die Blockliste von `a`
//! ein. Mehrfaches Eintragen ist idempotent und wird als `BereitsVorhanden`
//! gemeldet.

use std::collections::{BTreeSet, HashMap};

use palaver_core::Username;

/// Ergebnis einer Aenderung an einer Beziehungsliste
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeziehungsErgebnis {
    Hinzugefuegt,
    BereitsVorhanden,
    Entfernt,
    NichtVorhanden,
    /// Kanten auf sich selbst werden abgelehnt
    SelbstBezug,
}

#[derive(Debug, Default)]
struct Kanten {
    ziele: HashMap<Username, BTreeSet<Username>>,
}

impl Kanten {
    fn hinzufuegen(&mut self, akteur: &Username, ziel: &Username) -> BeziehungsErgebnis {
        if akteur == ziel {
            return BeziehungsErgebnis::SelbstBezug;
        }
        let neu = self
            .ziele
            .entry(akteur.clone())
            .or_default()
            .insert(ziel.clone());
        if neu {
            BeziehungsErgebnis::Hinzugefuegt
        } else {
            BeziehungsErgebnis::BereitsVorhanden
        }
    }

    fn entfernen(&mut self, akteur: &Username, ziel: &Username) -> BeziehungsErgebnis {
        if akteur == ziel {
            return BeziehungsErgebnis::SelbstBezug;
        }
        let Some(menge) = self.ziele.get_mut(akteur) else {
            return BeziehungsErgebnis::NichtVorhanden;
        };
        let entfernt = menge.remove(ziel);
        if menge.is_empty() {
            self.ziele.remove(akteur);
        }
        if entfernt {
            BeziehungsErgebnis::Entfernt
        } else {
            BeziehungsErgebnis::NichtVorhanden
        }
    }

    fn enthaelt(&self, akteur: &Username, ziel: &Username) -> bool {
        self.ziele
            .get(akteur)
            .is_some_and(|menge| menge.contains(ziel))
    }
}

/// Beziehungs-Kanten aller Identitaeten
///
/// Mit `stumm_filter = false` ist Stummschalten rein informativ: keine
/// Zustellung fragt den Stumm-Status ab.
#[derive(Debug, Default)]
pub struct RelationshipStore {
    stumm: Kanten,
    blockiert: Kanten,
    stumm_filter: bool,
}

impl RelationshipStore {
    pub fn neu(stumm_filter: bool) -> Self {
        Self {
            stumm_filter,
            ..Self::default()
        }
    }

    pub fn mute(&mut self, akteur: &Username, ziel: &Username) -> BeziehungsErgebnis {
        self.stumm.hinzufuegen(akteur, ziel)
    }

    pub fn unmute(&mut self, akteur: &Username, ziel: &Username) -> BeziehungsErgebnis {
        self.stumm.entfernen(akteur, ziel)
    }

    /// Hat `akteur` das `ziel` stummgeschaltet?
    pub fn is_muted(&self, akteur: &Username, ziel: &Username) -> bool {
        self.stumm.enthaelt(akteur, ziel)
    }

    pub fn block(&mut self, akteur: &Username, ziel: &Username) -> BeziehungsErgebnis {
        self.blockiert.hinzufuegen(akteur, ziel)
    }

    pub fn unblock(&mut self, akteur: &Username, ziel: &Username) -> BeziehungsErgebnis {
        self.blockiert.entfernen(akteur, ziel)
    }

    /// Wird `akteur` von `ziel` blockiert?
    ///
    /// Wahr genau dann, wenn `akteur` in der Blockliste von `ziel` steht.
    pub fn is_blocked(&self, akteur: &Username, ziel: &Username) -> bool {
        self.blockiert.enthaelt(ziel, akteur)
    }

    /// Soll Chat-Inhalt von `sender` bei `empfaenger` unterdrueckt werden?
    ///
    /// Nur wirksam mit aktivem Stumm-Filter; Blockierungen prueft der
    /// Aufrufer separat.
    pub fn unterdrueckt(&self, sender: &Username, empfaenger: &Username) -> bool {
        self.stumm_filter && self.is_muted(empfaenger, sender)
    }
}
