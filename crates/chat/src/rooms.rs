//! Raum-Verzeichnis
//!
//! Ein Raum existiert genau so lange, wie er Mitglieder hat. Verlaesst das
//! letzte Mitglied den Raum, werden Raum und Verlauf verworfen.

use std::collections::BTreeMap;

use palaver_core::Username;

use crate::history::HistoryStore;
use crate::relationships::RelationshipStore;
use crate::types::{Ausgang, Nachricht, Scope};

// ---------------------------------------------------------------------------
// Ergebnisse
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateErgebnis {
    Erstellt,
    ExistiertBereits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinErgebnis {
    Beigetreten,
    BereitsMitglied,
    NichtGefunden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveErgebnis {
    Verlassen { raum_geloescht: bool },
    KeinMitglied,
    NichtGefunden,
}

// ---------------------------------------------------------------------------
// Zustellkontext
// ---------------------------------------------------------------------------

/// Was ein Raum-Broadcast neben dem Verzeichnis braucht
///
/// Die Felder sind disjunkte Borrows aus dem Router-Zustand.
pub struct Zustellkontext<'a> {
    pub beziehungen: &'a RelationshipStore,
    pub verlauf: &'a mut HistoryStore,
    pub ausgang: &'a mut Ausgang,
}

// ---------------------------------------------------------------------------
// RoomDirectory
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Raum {
    /// Mitglieder in Beitrittsreihenfolge
    mitglieder: Vec<Username>,
}

#[derive(Debug, Default)]
pub struct RoomDirectory {
    raeume: BTreeMap<String, Raum>,
}

impl RoomDirectory {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt einen Raum an; der Ersteller ist erstes Mitglied
    pub fn create(&mut self, name: &str, ersteller: &Username) -> CreateErgebnis {
        if self.raeume.contains_key(name) {
            return CreateErgebnis::ExistiertBereits;
        }
        self.raeume.insert(
            name.to_string(),
            Raum {
                mitglieder: vec![ersteller.clone()],
            },
        );
        tracing::info!(raum = %name, ersteller = %ersteller, "Raum erstellt");
        CreateErgebnis::Erstellt
    }

    /// Tritt einem Raum bei und meldet das den bisherigen Mitgliedern
    pub fn join(
        &mut self,
        name: &str,
        identitaet: &Username,
        ctx: &mut Zustellkontext<'_>,
    ) -> JoinErgebnis {
        let Some(raum) = self.raeume.get_mut(name) else {
            return JoinErgebnis::NichtGefunden;
        };
        if raum.mitglieder.contains(identitaet) {
            return JoinErgebnis::BereitsMitglied;
        }
        raum.mitglieder.push(identitaet.clone());

        let hinweis = Nachricht::system(
            format!("'{identitaet}' joined the room."),
            Scope::Raum(name.to_string()),
        );
        verteilen(name, &raum.mitglieder, Some(identitaet), hinweis, ctx);

        tracing::debug!(raum = %name, username = %identitaet, "Raum beigetreten");
        JoinErgebnis::Beigetreten
    }

    /// Verlaesst einen Raum; der Hinweis landet noch im Verlauf, bevor ein
    /// leerer Raum samt Verlauf geloescht wird
    pub fn leave(
        &mut self,
        name: &str,
        identitaet: &Username,
        ctx: &mut Zustellkontext<'_>,
    ) -> LeaveErgebnis {
        let Some(raum) = self.raeume.get_mut(name) else {
            return LeaveErgebnis::NichtGefunden;
        };
        let Some(pos) = raum.mitglieder.iter().position(|m| m == identitaet) else {
            return LeaveErgebnis::KeinMitglied;
        };
        raum.mitglieder.remove(pos);

        let hinweis = Nachricht::system(
            format!("'{identitaet}' left the room."),
            Scope::Raum(name.to_string()),
        );
        verteilen(name, &raum.mitglieder, Some(identitaet), hinweis, ctx);

        let raum_geloescht = raum.mitglieder.is_empty();
        if raum_geloescht {
            self.raeume.remove(name);
            ctx.verlauf.drop_room(name);
            tracing::info!(raum = %name, "Raum geloescht (leer)");
        }
        LeaveErgebnis::Verlassen { raum_geloescht }
    }

    /// Sendet eine Nachricht an alle Mitglieder ausser dem Absender und
    /// ausser denen, die den Absender blockiert haben
    ///
    /// Die Nachricht wird immer in den Verlauf geschrieben. Gibt `None`
    /// zurueck wenn der Raum nicht existiert.
    pub fn broadcast_to_room(
        &self,
        name: &str,
        nachricht: Nachricht,
        ctx: &mut Zustellkontext<'_>,
    ) -> Option<usize> {
        let raum = self.raeume.get(name)?;
        let absender = nachricht.sender.clone();
        Some(verteilen(name, &raum.mitglieder, absender.as_ref(), nachricht, ctx))
    }

    /// Entfernt eine Identitaet aus allen Raeumen (Verbindungsabbau)
    ///
    /// Gibt die verlassenen Raeume zurueck, zusammen mit der Angabe, ob der
    /// Raum dabei geloescht wurde.
    pub fn leave_all(
        &mut self,
        identitaet: &Username,
        ctx: &mut Zustellkontext<'_>,
    ) -> Vec<(String, bool)> {
        let betroffen = self.raeume_von(identitaet);
        let mut verlassen = Vec::with_capacity(betroffen.len());
        for name in betroffen {
            if let LeaveErgebnis::Verlassen { raum_geloescht } = self.leave(&name, identitaet, ctx) {
                verlassen.push((name, raum_geloescht));
            }
        }
        verlassen
    }

    /// Namen aller Raeume, in denen die Identitaet Mitglied ist (sortiert)
    pub fn raeume_von(&self, identitaet: &Username) -> Vec<String> {
        self.raeume
            .iter()
            .filter(|(_, raum)| raum.mitglieder.contains(identitaet))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.raeume.contains_key(name)
    }

    pub fn mitglieder(&self, name: &str) -> Option<&[Username]> {
        self.raeume.get(name).map(|r| r.mitglieder.as_slice())
    }

    pub fn anzahl(&self) -> usize {
        self.raeume.len()
    }
}

/// Verteilt eine Raum-Nachricht und schreibt sie in den Verlauf
fn verteilen(
    raum: &str,
    mitglieder: &[Username],
    ausloeser: Option<&Username>,
    nachricht: Nachricht,
    ctx: &mut Zustellkontext<'_>,
) -> usize {
    let zeile = match &nachricht.sender {
        Some(sender) => format!("[{raum}] {sender}: {}", nachricht.text),
        None => format!("[{raum}] {}", nachricht.text),
    };

    let mut zugestellt = 0;
    for mitglied in mitglieder {
        if let Some(ausloeser) = ausloeser {
            if mitglied == ausloeser || ctx.beziehungen.is_blocked(ausloeser, mitglied) {
                continue;
            }
        }
        if let Some(sender) = &nachricht.sender {
            if ctx.beziehungen.unterdrueckt(sender, mitglied) {
                continue;
            }
        }
        ctx.ausgang.an(mitglied, zeile.clone());
        zugestellt += 1;
    }

    ctx.verlauf.append_room(raum, nachricht);
    zugestellt
}
