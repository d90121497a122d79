//! Nachrichtenverlauf pro Raum und pro Privat-Paar
//!
//! Jeder Verlauf ist ein Ringpuffer mit fester Kapazitaet; bei Ueberlauf
//! faellt der aelteste Eintrag heraus. Kapazitaet 0 bedeutet unbegrenzt.

use std::collections::{HashMap, VecDeque};

use crate::types::{Nachricht, PaarSchluessel};

/// Anzahl Eintraege, die `/room_history` und `/pm_history` zeigen
pub const ANZEIGE_LIMIT: usize = 50;

/// Standard-Kapazitaet pro Verlauf
pub const STANDARD_KAPAZITAET: usize = 1000;

#[derive(Debug)]
pub struct HistoryStore {
    raeume: HashMap<String, VecDeque<Nachricht>>,
    privat: HashMap<PaarSchluessel, VecDeque<Nachricht>>,
    kapazitaet: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::neu(STANDARD_KAPAZITAET)
    }
}

fn anhaengen(verlauf: &mut VecDeque<Nachricht>, eintrag: Nachricht, kapazitaet: usize) {
    if kapazitaet > 0 && verlauf.len() >= kapazitaet {
        verlauf.pop_front();
    }
    verlauf.push_back(eintrag);
}

fn juengste(verlauf: Option<&VecDeque<Nachricht>>, limit: usize) -> Vec<Nachricht> {
    match verlauf {
        Some(v) => v.iter().skip(v.len().saturating_sub(limit)).cloned().collect(),
        None => Vec::new(),
    }
}

impl HistoryStore {
    pub fn neu(kapazitaet: usize) -> Self {
        Self {
            raeume: HashMap::new(),
            privat: HashMap::new(),
            kapazitaet,
        }
    }

    pub fn append_room(&mut self, raum: &str, eintrag: Nachricht) {
        let verlauf = self.raeume.entry(raum.to_string()).or_default();
        anhaengen(verlauf, eintrag, self.kapazitaet);
    }

    pub fn append_private(&mut self, paar: &PaarSchluessel, eintrag: Nachricht) {
        let verlauf = self.privat.entry(paar.clone()).or_default();
        anhaengen(verlauf, eintrag, self.kapazitaet);
    }

    /// Die juengsten `limit` Eintraege, aeltester zuerst
    pub fn recent_room(&self, raum: &str, limit: usize) -> Vec<Nachricht> {
        juengste(self.raeume.get(raum), limit)
    }

    pub fn recent_private(&self, paar: &PaarSchluessel, limit: usize) -> Vec<Nachricht> {
        juengste(self.privat.get(paar), limit)
    }

    /// Verwirft den Verlauf eines geloeschten Raums
    pub fn drop_room(&mut self, raum: &str) {
        self.raeume.remove(raum);
    }

    pub fn raum_eintraege(&self, raum: &str) -> usize {
        self.raeume.get(raum).map_or(0, VecDeque::len)
    }
}
