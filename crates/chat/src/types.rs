//! Datentypen des Chat-Kerns

use std::fmt;

use chrono::{DateTime, Local};
use palaver_core::Username;

// ---------------------------------------------------------------------------
// Privat-Paar
// ---------------------------------------------------------------------------

/// Ungeordnetes Paar zweier Identitaeten
///
/// Intern sortiert gespeichert, damit (A, B) und (B, A) denselben Schluessel
/// ergeben.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaarSchluessel {
    erster: Username,
    zweiter: Username,
}

impl PaarSchluessel {
    pub fn neu(a: &Username, b: &Username) -> Self {
        if a <= b {
            Self {
                erster: a.clone(),
                zweiter: b.clone(),
            }
        } else {
            Self {
                erster: b.clone(),
                zweiter: a.clone(),
            }
        }
    }

    pub fn erster(&self) -> &Username {
        &self.erster
    }

    pub fn zweiter(&self) -> &Username {
        &self.zweiter
    }

    pub fn enthaelt(&self, u: &Username) -> bool {
        &self.erster == u || &self.zweiter == u
    }
}

impl fmt::Display for PaarSchluessel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.erster, self.zweiter)
    }
}

// ---------------------------------------------------------------------------
// Nachricht
// ---------------------------------------------------------------------------

/// Verlauf, in dem eine Nachricht landet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Raum(String),
    Privat(PaarSchluessel),
}

/// Eine Chat-Nachricht, wie sie im Verlauf landet
///
/// `sender` fehlt bei Systemhinweisen (Join/Leave).
#[derive(Debug, Clone)]
pub struct Nachricht {
    pub zeitpunkt: DateTime<Local>,
    pub sender: Option<Username>,
    pub text: String,
    pub scope: Scope,
}

impl Nachricht {
    pub fn von(sender: &Username, text: impl Into<String>, scope: Scope) -> Self {
        Self {
            zeitpunkt: Local::now(),
            sender: Some(sender.clone()),
            text: text.into(),
            scope,
        }
    }

    pub fn system(text: impl Into<String>, scope: Scope) -> Self {
        Self {
            zeitpunkt: Local::now(),
            sender: None,
            text: text.into(),
            scope,
        }
    }

    pub fn ist_system(&self) -> bool {
        self.sender.is_none()
    }

    /// Zeile fuer `/room_history` und `/pm_history`: `[HH:MM:SS] sender: text`
    pub fn verlaufszeile(&self) -> String {
        let zeit = self.zeitpunkt.format("%H:%M:%S");
        match &self.sender {
            Some(sender) => format!("[{zeit}] {sender}: {}", self.text),
            None => format!("[{zeit}] {}", self.text),
        }
    }
}

// ---------------------------------------------------------------------------
// Ausgang
// ---------------------------------------------------------------------------

/// Eine ausgehende Zeile fuer genau einen Empfaenger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zustellung {
    pub empfaenger: Username,
    pub text: String,
}

/// Gesammelte Zustellungen eines Befehls, in Reihenfolge
#[derive(Debug, Default)]
pub struct Ausgang {
    zustellungen: Vec<Zustellung>,
}

impl Ausgang {
    pub fn an(&mut self, empfaenger: &Username, text: impl Into<String>) {
        self.zustellungen.push(Zustellung {
            empfaenger: empfaenger.clone(),
            text: text.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.zustellungen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zustellungen.is_empty()
    }

    /// Alle Zeilen fuer einen Empfaenger
    pub fn fuer<'a>(&'a self, empfaenger: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.zustellungen
            .iter()
            .filter(move |z| z.empfaenger.as_str() == empfaenger)
            .map(|z| z.text.as_str())
    }
}

impl IntoIterator for Ausgang {
    type Item = Zustellung;
    type IntoIter = std::vec::IntoIter<Zustellung>;

    fn into_iter(self) -> Self::IntoIter {
        self.zustellungen.into_iter()
    }
}
