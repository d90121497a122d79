//! Anmelde-Ablauf einer Verbindung
//!
//! Reihenfolge: Begruessung -> Wahl (`/register` | `/login`) -> Benutzername
//! -> Passwort -> Pruefung durch den Router. Jede ungueltige Eingabe beendet
//! die Verbindung.

use palaver_core::Username;

pub const BEGRUESSUNG: &str = "Type '/register' to sign up or '/login' to sign in.";
pub const FRAGE_USERNAME: &str = "Enter username:";
pub const FRAGE_PASSWORT: &str = "Enter password:";
pub const UNGUELTIGE_WAHL: &str = "Invalid choice. Disconnecting.";
pub const UNGUELTIGER_USERNAME: &str = "Invalid username. Disconnecting.";
pub const UNGUELTIGES_PASSWORT: &str = "Invalid password. Disconnecting.";

/// Zustand einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsPhase {
    Unauthenticated,
    AwaitingChoice,
    AwaitingUsername,
    AwaitingPassword,
    Authenticated,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wahl {
    Registrieren,
    Anmelden,
}

impl Wahl {
    fn parse(eingabe: &str) -> Option<Self> {
        match eingabe.trim().to_ascii_lowercase().as_str() {
            "/register" => Some(Self::Registrieren),
            "/login" => Some(Self::Anmelden),
            _ => None,
        }
    }
}

/// Vollstaendige Eingaben zur Pruefung durch den Router
#[derive(Clone, PartialEq, Eq)]
pub struct Anmeldedaten {
    pub wahl: Wahl,
    pub username: Username,
    pub passwort: String,
}

// Passwort nie in Logs
impl std::fmt::Debug for Anmeldedaten {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Anmeldedaten")
            .field("wahl", &self.wahl)
            .field("username", &self.username)
            .field("passwort", &"***")
            .finish()
    }
}

/// Was die Verbindung als naechstes tun soll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AblaufAktion {
    /// Zeile senden und auf die naechste Eingabe warten
    Antwort(&'static str),
    /// Zeile senden und Verbindung schliessen
    Abbruch(&'static str),
    /// Eingaben vollstaendig, Router entscheidet
    Pruefen(Anmeldedaten),
}

#[derive(Debug)]
pub struct Anmeldeablauf {
    phase: VerbindungsPhase,
    wahl: Option<Wahl>,
    username: Option<Username>,
}

impl Default for Anmeldeablauf {
    fn default() -> Self {
        Self::neu()
    }
}

impl Anmeldeablauf {
    pub fn neu() -> Self {
        Self {
            phase: VerbindungsPhase::Unauthenticated,
            wahl: None,
            username: None,
        }
    }

    pub fn phase(&self) -> VerbindungsPhase {
        self.phase
    }

    /// Liefert die Begruessung und wartet danach auf die Wahl
    pub fn begruessung(&mut self) -> &'static str {
        self.phase = VerbindungsPhase::AwaitingChoice;
        BEGRUESSUNG
    }

    /// Verarbeitet eine Eingabezeile
    pub fn eingabe(&mut self, zeile: &str) -> AblaufAktion {
        let zeile = zeile.trim();
        match self.phase {
            VerbindungsPhase::Unauthenticated | VerbindungsPhase::AwaitingChoice => {
                match Wahl::parse(zeile) {
                    Some(wahl) => {
                        self.wahl = Some(wahl);
                        self.phase = VerbindungsPhase::AwaitingUsername;
                        AblaufAktion::Antwort(FRAGE_USERNAME)
                    }
                    None => self.abbrechen(UNGUELTIGE_WAHL),
                }
            }
            VerbindungsPhase::AwaitingUsername => match Username::parse(zeile) {
                Ok(username) => {
                    self.username = Some(username);
                    self.phase = VerbindungsPhase::AwaitingPassword;
                    AblaufAktion::Antwort(FRAGE_PASSWORT)
                }
                Err(e) => {
                    tracing::debug!(fehler = %e, "Ungueltiger Benutzername bei Anmeldung");
                    self.abbrechen(UNGUELTIGER_USERNAME)
                }
            },
            VerbindungsPhase::AwaitingPassword => {
                if zeile.is_empty() {
                    return self.abbrechen(UNGUELTIGES_PASSWORT);
                }
                match (self.wahl, self.username.take()) {
                    (Some(wahl), Some(username)) => AblaufAktion::Pruefen(Anmeldedaten {
                        wahl,
                        username,
                        passwort: zeile.to_string(),
                    }),
                    _ => self.abbrechen(UNGUELTIGE_WAHL),
                }
            }
            VerbindungsPhase::Authenticated | VerbindungsPhase::Disconnected => {
                self.abbrechen(UNGUELTIGE_WAHL)
            }
        }
    }

    /// Ergebnis der Pruefung uebernehmen
    pub fn abschliessen(&mut self, erfolgreich: bool) {
        self.phase = if erfolgreich {
            VerbindungsPhase::Authenticated
        } else {
            VerbindungsPhase::Disconnected
        };
    }

    fn abbrechen(&mut self, meldung: &'static str) -> AblaufAktion {
        self.phase = VerbindungsPhase::Disconnected;
        AblaufAktion::Abbruch(meldung)
    }
}
