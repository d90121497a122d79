//! MessageRouter – Befehls-Dispatch und einziger Mutator des Chat-Zustands
//!
//! Der gesamte Zustand (Sitzungen, Raeume, Beziehungen, Verlauf, Profile)
//! liegt hinter einem einzigen Mutex. Jede Zeile wird ausserhalb des Locks
//! geparst und dann in genau einer Lock-Phase ausgefuehrt und zugestellt.
//! Damit sind alle Pruefen-dann-Aendern-Folgen atomar, und jeder Empfaenger
//! sieht Zeilen in der Reihenfolge, in der die Befehle serialisiert wurden.
//!
//! Zugangsdaten werden vor dem Lock geprueft (Argon2 ist langsam).

use std::collections::HashMap;
use std::sync::Arc;

use palaver_auth::{AuthError, CredentialStore};
use palaver_core::{AuditLevel, AuditLog, Username};
use parking_lot::Mutex;

use crate::command::Befehl;
use crate::error::{AuthFehlschlag, ChatError, ChatResult};
use crate::history::{HistoryStore, ANZEIGE_LIMIT, STANDARD_KAPAZITAET};
use crate::login::{Anmeldedaten, Wahl};
use crate::registry::{ClientSender, RegisterErgebnis, SessionRegistry, ZustellBilanz};
use crate::relationships::{BeziehungsErgebnis, RelationshipStore};
use crate::rooms::{CreateErgebnis, JoinErgebnis, LeaveErgebnis, RoomDirectory, Zustellkontext};
use crate::types::{Ausgang, Nachricht, PaarSchluessel, Scope};

// ---------------------------------------------------------------------------
// Einstellungen
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatEinstellungen {
    /// Eintraege pro `/room_history` bzw. `/pm_history`
    pub anzeige_limit: usize,
    /// Kapazitaet pro Verlauf, 0 = unbegrenzt
    pub verlauf_limit: usize,
    /// Stummgeschaltete Absender tatsaechlich ausfiltern
    pub stumm_filter: bool,
}

impl Default for ChatEinstellungen {
    fn default() -> Self {
        Self {
            anzeige_limit: ANZEIGE_LIMIT,
            verlauf_limit: STANDARD_KAPAZITAET,
            stumm_filter: false,
        }
    }
}

/// Ergebnis einer verarbeiteten Zeile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verarbeitung {
    /// Befehlsname (`"ungueltig"` bei Parse-Fehlern, `"leer"` bei Leerzeilen)
    pub befehl: &'static str,
    pub zugestellt: usize,
    pub verworfen: usize,
    /// Fehlerart, falls der Befehl mit einem Fehler endete
    pub fehler: Option<&'static str>,
    /// Verbindung soll geschlossen werden (`/quit`)
    pub beenden: bool,
}

/// Erfolgreiche Anmeldung samt Zustellung von Willkommen und Join-Hinweis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anmeldung {
    pub username: Username,
    pub bilanz: ZustellBilanz,
}

// ---------------------------------------------------------------------------
// Zustand
// ---------------------------------------------------------------------------

struct ChatZustand {
    sessions: SessionRegistry,
    raeume: RoomDirectory,
    beziehungen: RelationshipStore,
    verlauf: HistoryStore,
    profile: HashMap<Username, String>,
    anzeige_limit: usize,
}

impl ChatZustand {
    fn neu(einstellungen: ChatEinstellungen) -> Self {
        Self {
            sessions: SessionRegistry::neu(),
            raeume: RoomDirectory::neu(),
            beziehungen: RelationshipStore::neu(einstellungen.stumm_filter),
            verlauf: HistoryStore::neu(einstellungen.verlauf_limit),
            profile: HashMap::new(),
            anzeige_limit: einstellungen.anzeige_limit,
        }
    }

    /// Globaler Broadcast an alle Sitzungen ausser dem Akteur und denen, die
    /// ihn blockiert haben
    fn an_alle_ausser(&self, akteur: &Username, text: &str, inhalt: bool, ausgang: &mut Ausgang) {
        for name in self.sessions.namen() {
            if name == akteur || self.beziehungen.is_blocked(akteur, name) {
                continue;
            }
            if inhalt && self.beziehungen.unterdrueckt(akteur, name) {
                continue;
            }
            ausgang.an(name, text);
        }
    }

    fn ausfuehren(
        &mut self,
        akteur: &Username,
        befehl: Befehl,
        ausgang: &mut Ausgang,
        audit: &dyn AuditLog,
    ) -> ChatResult<()> {
        match befehl {
            Befehl::Quit => {
                ausgang.an(akteur, "Goodbye!");
            }

            Befehl::List => {
                let namen: Vec<&str> = self.sessions.namen().map(Username::as_str).collect();
                ausgang.an(akteur, format!("Online Users: {}", namen.join(", ")));
            }

            Befehl::Private { an, text } => {
                let ziel = Username::parse(&an).ok();
                if let Some(ziel) = &ziel {
                    if self.beziehungen.is_blocked(akteur, ziel) {
                        return Err(ChatError::verweigert(format!("You are blocked by {an}.")));
                    }
                    if self.beziehungen.is_blocked(ziel, akteur) {
                        return Err(ChatError::verweigert(format!("You have blocked {an}.")));
                    }
                }
                let Some(ziel) = ziel.filter(|z| self.sessions.ist_online(z)) else {
                    return Err(ChatError::nicht_gefunden(format!(
                        "User {an} not found or offline."
                    )));
                };

                if !self.beziehungen.unterdrueckt(akteur, &ziel) {
                    ausgang.an(&ziel, format!("(Private - {akteur}): {text}"));
                }
                ausgang.an(akteur, format!("(Private to {ziel}): {text}"));

                let paar = PaarSchluessel::neu(akteur, &ziel);
                let scope = Scope::Privat(paar.clone());
                self.verlauf
                    .append_private(&paar, Nachricht::von(akteur, text, scope));
                audit.record(
                    &format!("Private message: {akteur} -> {ziel}"),
                    AuditLevel::Info,
                );
            }

            Befehl::CreateRoom(raum) => match self.raeume.create(&raum, akteur) {
                CreateErgebnis::Erstellt => {
                    ausgang.an(akteur, format!("Room '{raum}' created."));
                    audit.record(
                        &format!("User '{akteur}' created room '{raum}'"),
                        AuditLevel::Info,
                    );
                }
                CreateErgebnis::ExistiertBereits => {
                    ausgang.an(akteur, format!("Room '{raum}' already exists."));
                }
            },

            Befehl::Join(raum) => {
                let mut ctx = Zustellkontext {
                    beziehungen: &self.beziehungen,
                    verlauf: &mut self.verlauf,
                    ausgang: &mut *ausgang,
                };
                match self.raeume.join(&raum, akteur, &mut ctx) {
                    JoinErgebnis::Beigetreten => {
                        ausgang.an(akteur, format!("Joined room '{raum}'."));
                        audit.record(
                            &format!("User '{akteur}' joined room '{raum}'"),
                            AuditLevel::Info,
                        );
                    }
                    JoinErgebnis::BereitsMitglied => {
                        ausgang.an(akteur, format!("You're already in room '{raum}'."));
                    }
                    JoinErgebnis::NichtGefunden => {
                        return Err(ChatError::nicht_gefunden(format!(
                            "Room '{raum}' not found."
                        )));
                    }
                }
            }

            Befehl::Leave(raum) => {
                let mut ctx = Zustellkontext {
                    beziehungen: &self.beziehungen,
                    verlauf: &mut self.verlauf,
                    ausgang: &mut *ausgang,
                };
                match self.raeume.leave(&raum, akteur, &mut ctx) {
                    LeaveErgebnis::Verlassen { raum_geloescht } => {
                        ausgang.an(akteur, format!("Left room '{raum}'."));
                        audit.record(
                            &format!("User '{akteur}' left room '{raum}'"),
                            AuditLevel::Info,
                        );
                        if raum_geloescht {
                            audit.record(
                                &format!("Room '{raum}' deleted (empty)."),
                                AuditLevel::Info,
                            );
                        }
                    }
                    LeaveErgebnis::KeinMitglied => {
                        ausgang.an(akteur, format!("You're not in room '{raum}'."));
                    }
                    LeaveErgebnis::NichtGefunden => {
                        return Err(ChatError::nicht_gefunden(format!(
                            "Room '{raum}' not found."
                        )));
                    }
                }
            }

            Befehl::RoomHistory(raum) => {
                if !self.raeume.exists(&raum) {
                    ausgang.an(akteur, format!("No history found for room '{raum}'."));
                    return Ok(());
                }
                ausgang.an(akteur, format!("Room '{raum}' history:"));
                for eintrag in self.verlauf.recent_room(&raum, self.anzeige_limit) {
                    ausgang.an(akteur, format!("- {}", eintrag.verlaufszeile()));
                }
            }

            Befehl::PmHistory(anderer) => {
                let eintraege = match Username::parse(&anderer) {
                    Ok(u) => self
                        .verlauf
                        .recent_private(&PaarSchluessel::neu(akteur, &u), self.anzeige_limit),
                    Err(_) => Vec::new(),
                };
                if eintraege.is_empty() {
                    ausgang.an(
                        akteur,
                        format!("No message history between {akteur} and {anderer}."),
                    );
                    return Ok(());
                }
                ausgang.an(
                    akteur,
                    format!("Private messages between {akteur} and {anderer}:"),
                );
                for eintrag in eintraege {
                    ausgang.an(akteur, format!("- {}", eintrag.verlaufszeile()));
                }
            }

            Befehl::SetProfile(profil) => {
                self.profile.insert(akteur.clone(), profil);
                ausgang.an(akteur, "Profile updated.");
                audit.record(
                    &format!("User '{akteur}' updated profile"),
                    AuditLevel::Info,
                );
            }

            Befehl::Profile(ziel) => match self.profile.get(ziel.as_str()) {
                Some(profil) => ausgang.an(akteur, format!("Profile of {ziel}: {profil}")),
                None => {
                    return Err(ChatError::nicht_gefunden(format!(
                        "No profile found for {ziel}."
                    )));
                }
            },

            Befehl::Mute(ziel) => {
                let ergebnis = self.beziehungen.mute(akteur, &ziel);
                let antwort = beziehung_antwort(ergebnis, &ziel, Kante::Stumm, true)?;
                ausgang.an(akteur, antwort);
                if ergebnis == BeziehungsErgebnis::Hinzugefuegt {
                    audit.record(&format!("User '{akteur}' muted '{ziel}'"), AuditLevel::Info);
                }
            }

            Befehl::Unmute(ziel) => {
                let ergebnis = self.beziehungen.unmute(akteur, &ziel);
                let antwort = beziehung_antwort(ergebnis, &ziel, Kante::Stumm, false)?;
                ausgang.an(akteur, antwort);
                if ergebnis == BeziehungsErgebnis::Entfernt {
                    audit.record(&format!("User '{akteur}' unmuted '{ziel}'"), AuditLevel::Info);
                }
            }

            Befehl::Block(ziel) => {
                let ergebnis = self.beziehungen.block(akteur, &ziel);
                let antwort = beziehung_antwort(ergebnis, &ziel, Kante::Block, true)?;
                ausgang.an(akteur, antwort);
                if ergebnis == BeziehungsErgebnis::Hinzugefuegt {
                    audit.record(&format!("User '{akteur}' blocked '{ziel}'"), AuditLevel::Info);
                }
            }

            Befehl::Unblock(ziel) => {
                let ergebnis = self.beziehungen.unblock(akteur, &ziel);
                let antwort = beziehung_antwort(ergebnis, &ziel, Kante::Block, false)?;
                ausgang.an(akteur, antwort);
                if ergebnis == BeziehungsErgebnis::Entfernt {
                    audit.record(
                        &format!("User '{akteur}' unblocked '{ziel}'"),
                        AuditLevel::Info,
                    );
                }
            }

            Befehl::Status(status) => {
                self.sessions.set_status(akteur, status, ausgang);
                ausgang.an(akteur, format!("Status updated: {status}."));
                audit.record(
                    &format!("User '{akteur}' status updated: {status}"),
                    AuditLevel::Info,
                );
            }

            Befehl::Text(text) => {
                let raeume = self.raeume.raeume_von(akteur);
                if raeume.is_empty() {
                    self.an_alle_ausser(akteur, &format!("[{akteur}]: {text}"), true, ausgang);
                    return Ok(());
                }
                let mut ctx = Zustellkontext {
                    beziehungen: &self.beziehungen,
                    verlauf: &mut self.verlauf,
                    ausgang: &mut *ausgang,
                };
                for raum in raeume {
                    let nachricht = Nachricht::von(akteur, text.as_str(), Scope::Raum(raum.clone()));
                    self.raeume.broadcast_to_room(&raum, nachricht, &mut ctx);
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Kante {
    Stumm,
    Block,
}

/// Antwortzeile fuer `/mute`, `/unmute`, `/block` und `/unblock`
fn beziehung_antwort(
    ergebnis: BeziehungsErgebnis,
    ziel: &Username,
    kante: Kante,
    setzen: bool,
) -> ChatResult<String> {
    let (zustand, verb, infinitiv) = match (kante, setzen) {
        (Kante::Stumm, true) => ("muted", "Muted", "mute"),
        (Kante::Stumm, false) => ("muted", "Unmuted", "unmute"),
        (Kante::Block, true) => ("blocked", "Blocked", "block"),
        (Kante::Block, false) => ("blocked", "Unblocked", "unblock"),
    };
    match ergebnis {
        BeziehungsErgebnis::Hinzugefuegt | BeziehungsErgebnis::Entfernt => {
            Ok(format!("{verb} {ziel}."))
        }
        BeziehungsErgebnis::BereitsVorhanden => Ok(format!("{ziel} is already {zustand}.")),
        BeziehungsErgebnis::NichtVorhanden => Ok(format!("{ziel} is not {zustand}.")),
        BeziehungsErgebnis::SelbstBezug => Err(ChatError::protokoll(format!(
            "You cannot {infinitiv} yourself."
        ))),
    }
}

// ---------------------------------------------------------------------------
// MessageRouter
// ---------------------------------------------------------------------------

/// Zentrale Instanz fuer alle Verbindungen
pub struct MessageRouter<C: CredentialStore> {
    credentials: Arc<C>,
    audit: Arc<dyn AuditLog>,
    zustand: Mutex<ChatZustand>,
}

impl<C: CredentialStore> MessageRouter<C> {
    /// Erstellt einen neuen MessageRouter
    pub fn neu(
        credentials: Arc<C>,
        audit: Arc<dyn AuditLog>,
        einstellungen: ChatEinstellungen,
    ) -> Arc<Self> {
        Arc::new(Self {
            credentials,
            audit,
            zustand: Mutex::new(ChatZustand::neu(einstellungen)),
        })
    }

    /// Prueft die Anmeldedaten und registriert die Sitzung
    ///
    /// Bei Erfolg erhaelt der Client die Willkommenszeile und alle anderen den
    /// Join-Hinweis. Bei Fehler ist der `Display`-Text die Zeile, die der
    /// Client vor dem Trennen erhalten soll.
    pub async fn anmelden(
        &self,
        daten: Anmeldedaten,
        sender: ClientSender,
    ) -> ChatResult<Anmeldung> {
        let Anmeldedaten {
            wahl,
            username,
            passwort,
        } = daten;

        match wahl {
            Wahl::Registrieren => match self.credentials.register(&username, &passwort).await {
                Ok(()) => {
                    self.audit
                        .record(&format!("New user registered: {username}"), AuditLevel::Info);
                }
                Err(AuthError::BenutzernameVergeben(_)) => {
                    return Err(self.anmeldung_fehlgeschlagen(
                        &username,
                        AuthFehlschlag::BenutzernameVergeben,
                    ));
                }
                Err(e) => {
                    tracing::error!(username = %username, fehler = %e, "Registrierung fehlgeschlagen");
                    return Err(self.anmeldung_fehlgeschlagen(
                        &username,
                        AuthFehlschlag::SpeicherNichtVerfuegbar,
                    ));
                }
            },
            Wahl::Anmelden => match self.credentials.verify(&username, &passwort).await {
                Ok(true) => {}
                Ok(false) => {
                    return Err(self.anmeldung_fehlgeschlagen(
                        &username,
                        AuthFehlschlag::UngueltigeZugangsdaten,
                    ));
                }
                Err(e) => {
                    tracing::error!(username = %username, fehler = %e, "Verifikation fehlgeschlagen");
                    return Err(self.anmeldung_fehlgeschlagen(
                        &username,
                        AuthFehlschlag::SpeicherNichtVerfuegbar,
                    ));
                }
            },
        }

        let mut zustand = self.zustand.lock();
        if zustand.sessions.register(&username, sender) == RegisterErgebnis::AlreadyLoggedIn {
            return Err(self.anmeldung_fehlgeschlagen(&username, AuthFehlschlag::BereitsAngemeldet));
        }

        let mut ausgang = Ausgang::default();
        let willkommen = match wahl {
            Wahl::Registrieren => format!("Registration successful! Welcome {username}."),
            Wahl::Anmelden => format!("Login successful! Welcome back {username}."),
        };
        ausgang.an(&username, willkommen);
        zustand.an_alle_ausser(
            &username,
            &format!("'{username}' joined the chat!"),
            false,
            &mut ausgang,
        );
        let bilanz = zustand.sessions.zustellen(ausgang);

        tracing::info!(username = %username, online = zustand.sessions.anzahl(), "Client angemeldet");
        self.audit.record(
            &format!("User '{username}' authenticated successfully"),
            AuditLevel::Info,
        );
        Ok(Anmeldung { username, bilanz })
    }

    fn anmeldung_fehlgeschlagen(&self, username: &Username, grund: AuthFehlschlag) -> ChatError {
        let fehler = ChatError::Authentifizierung(grund);
        tracing::warn!(username = %username, grund = ?grund, "Anmeldung abgelehnt");
        self.audit.record(
            &format!("Authentication failed for '{username}': {fehler}"),
            fehler.audit_level(),
        );
        fehler
    }

    /// Verarbeitet eine Zeile eines angemeldeten Clients
    pub fn verarbeiten(&self, akteur: &Username, zeile: &str) -> Verarbeitung {
        let zeile = zeile.trim();
        if zeile.is_empty() {
            return Verarbeitung {
                befehl: "leer",
                ..Verarbeitung::default()
            };
        }

        // Parsen ausserhalb des Locks
        let befehl = Befehl::parse(zeile);

        let mut zustand = self.zustand.lock();
        if !zustand.sessions.ist_online(akteur) {
            tracing::debug!(username = %akteur, "Zeile ohne aktive Sitzung ignoriert");
            return Verarbeitung {
                befehl: "ohne_sitzung",
                beenden: true,
                ..Verarbeitung::default()
            };
        }

        let mut ausgang = Ausgang::default();
        let mut ergebnis = Verarbeitung::default();

        let ausgefuehrt = match befehl {
            Ok(befehl) => {
                ergebnis.befehl = befehl.name();
                ergebnis.beenden = befehl == Befehl::Quit;
                tracing::debug!(username = %akteur, befehl = befehl.name(), "Befehl");
                zustand.ausfuehren(akteur, befehl, &mut ausgang, self.audit.as_ref())
            }
            Err(e) => {
                ergebnis.befehl = "ungueltig";
                Err(e)
            }
        };

        if let Err(fehler) = ausgefuehrt {
            tracing::debug!(username = %akteur, fehler = %fehler, art = fehler.art(), "Befehl abgelehnt");
            self.audit.record(
                &format!("Command from '{akteur}' rejected: {fehler}"),
                fehler.audit_level(),
            );
            ergebnis.fehler = Some(fehler.art());
            ausgang.an(akteur, fehler.to_string());
        }

        let bilanz = zustand.sessions.zustellen(ausgang);
        ergebnis.zugestellt = bilanz.zugestellt;
        ergebnis.verworfen = bilanz.verworfen;
        ergebnis
    }

    /// Baut eine Sitzung ab: abmelden, alle Raeume verlassen, Abschied senden
    ///
    /// Laeuft in einer einzigen Lock-Phase. Gibt `None` zurueck wenn keine
    /// Sitzung bestand, sonst die Bilanz der Abschiedszeilen.
    pub fn trennen(&self, username: &Username) -> Option<ZustellBilanz> {
        let mut guard = self.zustand.lock();
        let zustand = &mut *guard;
        if !zustand.sessions.unregister(username) {
            return None;
        }

        let mut ausgang = Ausgang::default();
        let mut ctx = Zustellkontext {
            beziehungen: &zustand.beziehungen,
            verlauf: &mut zustand.verlauf,
            ausgang: &mut ausgang,
        };
        let verlassen = zustand.raeume.leave_all(username, &mut ctx);
        for (raum, geloescht) in &verlassen {
            self.audit.record(
                &format!("User '{username}' left room '{raum}'"),
                AuditLevel::Info,
            );
            if *geloescht {
                self.audit
                    .record(&format!("Room '{raum}' deleted (empty)."), AuditLevel::Info);
            }
        }

        zustand.an_alle_ausser(
            username,
            &format!("'{username}' left the chat."),
            false,
            &mut ausgang,
        );
        let bilanz = zustand.sessions.zustellen(ausgang);

        tracing::info!(
            username = %username,
            raeume = verlassen.len(),
            online = zustand.sessions.anzahl(),
            "Client getrennt"
        );
        self.audit
            .record(&format!("User '{username}' disconnected"), AuditLevel::Info);
        Some(bilanz)
    }

    pub fn online_anzahl(&self) -> usize {
        self.zustand.lock().sessions.anzahl()
    }

    pub fn raum_anzahl(&self) -> usize {
        self.zustand.lock().raeume.anzahl()
    }

    pub fn ist_online(&self, username: &Username) -> bool {
        self.zustand.lock().sessions.ist_online(username)
    }

    pub fn raum_existiert(&self, raum: &str) -> bool {
        self.zustand.lock().raeume.exists(raum)
    }

    pub fn raum_mitglieder(&self, raum: &str) -> Option<Vec<Username>> {
        self.zustand
            .lock()
            .raeume
            .mitglieder(raum)
            .map(<[Username]>::to_vec)
    }
}
