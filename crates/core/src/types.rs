//! Gemeinsame Identifikationstypen fuer palaver
//!
//! Benutzernamen verwenden das Newtype-Pattern, damit nur validierte Namen
//! in Registry, Raeume und Beziehungslisten gelangen.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UsernameFehler;

/// Maximale Laenge eines Benutzernamens in Zeichen
pub const USERNAME_MAX_LAENGE: usize = 32;

/// Registrierter Benutzername (unveraenderlich nach der Registrierung)
///
/// Gueltig sind nicht-leere Namen ohne Whitespace und ohne `:`, die nicht
/// mit `/` beginnen. `:` ist das Trennzeichen der Benutzerdatei, Whitespace
/// trennt Befehlsargumente.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validiert und erstellt einen Benutzernamen
    pub fn parse(roh: &str) -> Result<Self, UsernameFehler> {
        if roh.is_empty() {
            return Err(UsernameFehler::Leer);
        }
        let laenge = roh.chars().count();
        if laenge > USERNAME_MAX_LAENGE {
            return Err(UsernameFehler::ZuLang {
                laenge,
                max: USERNAME_MAX_LAENGE,
            });
        }
        if roh.starts_with('/') {
            return Err(UsernameFehler::BefehlsPraefix);
        }
        if let Some(c) = roh.chars().find(|c| c.is_whitespace() || *c == ':') {
            return Err(UsernameFehler::UngueltigesZeichen(c));
        }
        Ok(Self(roh.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Username {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for Username {
    type Err = UsernameFehler;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameFehler;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Username> for String {
    fn from(u: Username) -> Self {
        u.0
    }
}

/// Praesenz-Status einer Identitaet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PresenceStatus {
    #[default]
    Online,
    Busy,
    DoNotDisturb,
    Offline,
}

impl PresenceStatus {
    /// Parst den Wert eines `/status`-Befehls (Gross-/Kleinschreibung egal)
    pub fn aus_befehl(wert: &str) -> Option<Self> {
        match wert.to_ascii_lowercase().as_str() {
            "online" => Some(Self::Online),
            "busy" => Some(Self::Busy),
            "dnd" => Some(Self::DoNotDisturb),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    /// Anzeigename im Chat
    pub fn anzeige(&self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Busy => "Busy",
            Self::DoNotDisturb => "Do Not Disturb",
            Self::Offline => "Offline",
        }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.anzeige())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gueltiger_username() {
        let u = Username::parse("alice_01").unwrap();
        assert_eq!(u.as_str(), "alice_01");
        assert_eq!(u.to_string(), "alice_01");
    }

    #[test]
    fn ungueltige_usernames() {
        assert_eq!(Username::parse(""), Err(UsernameFehler::Leer));
        assert_eq!(
            Username::parse("a b"),
            Err(UsernameFehler::UngueltigesZeichen(' '))
        );
        assert_eq!(
            Username::parse("a:b"),
            Err(UsernameFehler::UngueltigesZeichen(':'))
        );
        assert_eq!(Username::parse("/quit"), Err(UsernameFehler::BefehlsPraefix));
        assert!(matches!(
            Username::parse(&"x".repeat(33)),
            Err(UsernameFehler::ZuLang { laenge: 33, .. })
        ));
    }

    #[test]
    fn username_als_str_schluessel() {
        let mut map = std::collections::HashMap::new();
        map.insert(Username::parse("bob").unwrap(), 1);
        assert_eq!(map.get("bob"), Some(&1));
    }

    #[test]
    fn username_serde_validiert() {
        let ok: Username = serde_json::from_str("\"carol\"").unwrap();
        assert_eq!(ok.as_str(), "carol");
        assert!(serde_json::from_str::<Username>("\"no way\"").is_err());
    }

    #[test]
    fn status_aus_befehl() {
        assert_eq!(PresenceStatus::aus_befehl("online"), Some(PresenceStatus::Online));
        assert_eq!(PresenceStatus::aus_befehl("BUSY"), Some(PresenceStatus::Busy));
        assert_eq!(PresenceStatus::aus_befehl("dnd"), Some(PresenceStatus::DoNotDisturb));
        assert_eq!(PresenceStatus::aus_befehl("Offline"), Some(PresenceStatus::Offline));
        assert_eq!(PresenceStatus::aus_befehl("away"), None);
    }

    #[test]
    fn status_anzeige() {
        assert_eq!(PresenceStatus::DoNotDisturb.to_string(), "Do Not Disturb");
        assert_eq!(PresenceStatus::default(), PresenceStatus::Online);
    }
}
