//! Befehls-Grammatik nach der Anmeldung
//!
//! Jede Zeile wird genau einmal in einen `Befehl` uebersetzt. Das erste
//! Token muss exakt einem Schluesselwort entsprechen (`/profile` und
//! `/profilex` sind verschieden); alles ohne fuehrendes `/` ist Chat-Text.

use palaver_core::{PresenceStatus, Username};

use crate::error::ChatError;

pub const UNBEKANNTER_BEFEHL: &str = "Unknown command. Type /help for available commands.";

const USAGE_QUIT: &str = "Usage: /quit";
const USAGE_LIST: &str = "Usage: /list";
const USAGE_PRIVATE: &str = "Usage: /private <username> <message>";
const USAGE_CREATE_ROOM: &str = "Usage: /create_room <room_name>";
const USAGE_JOIN: &str = "Usage: /join <room_name>";
const USAGE_LEAVE: &str = "Usage: /leave <room_name>";
const USAGE_ROOM_HISTORY: &str = "Usage: /room_history <room_name>";
const USAGE_PM_HISTORY: &str = "Usage: /pm_history <username>";
const USAGE_SET_PROFILE: &str = "Usage: /set_profile <profile_info>";
const USAGE_PROFILE: &str = "Usage: /profile <username>";
const USAGE_MUTE: &str = "Usage: /mute <username>";
const USAGE_UNMUTE: &str = "Usage: /unmute <username>";
const USAGE_BLOCK: &str = "Usage: /block <username>";
const USAGE_UNBLOCK: &str = "Usage: /unblock <username>";
const USAGE_STATUS: &str = "Usage: /status <online|busy|dnd|offline>";

/// Ein geparster Befehl eines angemeldeten Clients
///
/// Nachschlage-Ziele (`/private`, `/pm_history`, `/profile`) bleiben rohe
/// Strings; Beziehungs-Ziele werden als `Username` validiert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Befehl {
    Quit,
    List,
    Private { an: String, text: String },
    CreateRoom(String),
    Join(String),
    Leave(String),
    RoomHistory(String),
    PmHistory(String),
    SetProfile(String),
    Profile(String),
    Mute(Username),
    Unmute(Username),
    Block(Username),
    Unblock(Username),
    Status(PresenceStatus),
    Text(String),
}

impl Befehl {
    /// Parst eine nicht-leere Zeile
    pub fn parse(zeile: &str) -> Result<Self, ChatError> {
        let zeile = zeile.trim();
        if !zeile.starts_with('/') {
            return Ok(Self::Text(zeile.to_string()));
        }

        let (kopf, rest) = match zeile.split_once(char::is_whitespace) {
            Some((kopf, rest)) => (kopf, rest.trim()),
            None => (zeile, ""),
        };

        match kopf {
            "/quit" => ohne_argumente(rest, Self::Quit, USAGE_QUIT),
            "/list" => ohne_argumente(rest, Self::List, USAGE_LIST),
            "/private" => {
                let (an, text) = rest
                    .split_once(char::is_whitespace)
                    .map(|(an, text)| (an, text.trim()))
                    .filter(|(an, text)| !an.is_empty() && !text.is_empty())
                    .ok_or_else(|| ChatError::protokoll(USAGE_PRIVATE))?;
                Ok(Self::Private {
                    an: an.to_string(),
                    text: text.to_string(),
                })
            }
            "/create_room" => rest_der_zeile(rest, USAGE_CREATE_ROOM).map(Self::CreateRoom),
            "/join" => rest_der_zeile(rest, USAGE_JOIN).map(Self::Join),
            "/leave" => rest_der_zeile(rest, USAGE_LEAVE).map(Self::Leave),
            "/room_history" => rest_der_zeile(rest, USAGE_ROOM_HISTORY).map(Self::RoomHistory),
            "/pm_history" => ein_wort(rest, USAGE_PM_HISTORY).map(Self::PmHistory),
            "/set_profile" => rest_der_zeile(rest, USAGE_SET_PROFILE).map(Self::SetProfile),
            "/profile" => ein_wort(rest, USAGE_PROFILE).map(Self::Profile),
            "/mute" => ziel(rest, USAGE_MUTE).map(Self::Mute),
            "/unmute" => ziel(rest, USAGE_UNMUTE).map(Self::Unmute),
            "/block" => ziel(rest, USAGE_BLOCK).map(Self::Block),
            "/unblock" => ziel(rest, USAGE_UNBLOCK).map(Self::Unblock),
            "/status" => ein_wort(rest, USAGE_STATUS)
                .ok()
                .and_then(|wert| PresenceStatus::aus_befehl(&wert))
                .map(Self::Status)
                .ok_or_else(|| ChatError::protokoll(USAGE_STATUS)),
            _ => Err(ChatError::protokoll(UNBEKANNTER_BEFEHL)),
        }
    }

    /// Kurzname fuer Logs und Metrik-Labels
    pub fn name(&self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::List => "list",
            Self::Private { .. } => "private",
            Self::CreateRoom(_) => "create_room",
            Self::Join(_) => "join",
            Self::Leave(_) => "leave",
            Self::RoomHistory(_) => "room_history",
            Self::PmHistory(_) => "pm_history",
            Self::SetProfile(_) => "set_profile",
            Self::Profile(_) => "profile",
            Self::Mute(_) => "mute",
            Self::Unmute(_) => "unmute",
            Self::Block(_) => "block",
            Self::Unblock(_) => "unblock",
            Self::Status(_) => "status",
            Self::Text(_) => "text",
        }
    }
}

fn ohne_argumente(rest: &str, befehl: Befehl, usage: &str) -> Result<Befehl, ChatError> {
    if rest.is_empty() {
        Ok(befehl)
    } else {
        Err(ChatError::protokoll(usage))
    }
}

/// Rest der Zeile, darf Leerzeichen enthalten
fn rest_der_zeile(rest: &str, usage: &str) -> Result<String, ChatError> {
    if rest.is_empty() {
        Err(ChatError::protokoll(usage))
    } else {
        Ok(rest.to_string())
    }
}

/// Genau ein Token
fn ein_wort(rest: &str, usage: &str) -> Result<String, ChatError> {
    if rest.is_empty() || rest.contains(char::is_whitespace) {
        Err(ChatError::protokoll(usage))
    } else {
        Ok(rest.to_string())
    }
}

fn ziel(rest: &str, usage: &str) -> Result<Username, ChatError> {
    let wort = ein_wort(rest, usage)?;
    Username::parse(&wort).map_err(|_| ChatError::protokoll(usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(zeile: &str) -> String {
        match Befehl::parse(zeile) {
            Err(ChatError::Protokoll(text)) => text,
            anderes => panic!("Usage-Fehler erwartet, erhalten: {anderes:?}"),
        }
    }

    #[test]
    fn einfache_befehle() {
        assert_eq!(Befehl::parse("/quit").unwrap(), Befehl::Quit);
        assert_eq!(Befehl::parse("  /list  ").unwrap(), Befehl::List);
        assert_eq!(usage("/list alle"), "Usage: /list");
    }

    #[test]
    fn private_braucht_ziel_und_text() {
        assert_eq!(
            Befehl::parse("/private bob hallo  du da").unwrap(),
            Befehl::Private {
                an: "bob".into(),
                text: "hallo  du da".into()
            }
        );
        assert_eq!(usage("/private bob"), "Usage: /private <username> <message>");
        assert_eq!(usage("/private"), "Usage: /private <username> <message>");
    }

    #[test]
    fn raumnamen_duerfen_leerzeichen_enthalten() {
        assert_eq!(
            Befehl::parse("/create_room  grosse halle ").unwrap(),
            Befehl::CreateRoom("grosse halle".into())
        );
        assert_eq!(Befehl::parse("/join lobby").unwrap(), Befehl::Join("lobby".into()));
        assert_eq!(usage("/leave"), "Usage: /leave <room_name>");
        assert_eq!(usage("/room_history "), "Usage: /room_history <room_name>");
    }

    #[test]
    fn erstes_token_muss_exakt_passen() {
        assert_eq!(usage("/profilex bob"), UNBEKANNTER_BEFEHL);
        assert_eq!(usage("/help"), UNBEKANNTER_BEFEHL);
        assert_eq!(usage("/"), UNBEKANNTER_BEFEHL);
        assert_eq!(usage("/profile"), "Usage: /profile <username>");
        assert_eq!(Befehl::parse("/profile bob").unwrap(), Befehl::Profile("bob".into()));
    }

    #[test]
    fn beziehungsziele_werden_validiert() {
        assert_eq!(
            Befehl::parse("/block bob").unwrap(),
            Befehl::Block(Username::parse("bob").unwrap())
        );
        assert_eq!(usage("/mute a b"), "Usage: /mute <username>");
        assert_eq!(usage("/unblock a:b"), "Usage: /unblock <username>");
        assert_eq!(usage("/unmute"), "Usage: /unmute <username>");
    }

    #[test]
    fn status_werte() {
        assert_eq!(
            Befehl::parse("/status DND").unwrap(),
            Befehl::Status(PresenceStatus::DoNotDisturb)
        );
        assert_eq!(usage("/status away"), "Usage: /status <online|busy|dnd|offline>");
        assert_eq!(usage("/status"), "Usage: /status <online|busy|dnd|offline>");
    }

    #[test]
    fn text_ohne_schraegstrich() {
        assert_eq!(Befehl::parse("hi /quit").unwrap(), Befehl::Text("hi /quit".into()));
        assert_eq!(Befehl::parse("hi").unwrap().name(), "text");
    }

    #[test]
    fn set_profile_nimmt_ganze_zeile() {
        assert_eq!(
            Befehl::parse("/set_profile Ich mag Rust.").unwrap(),
            Befehl::SetProfile("Ich mag Rust.".into())
        );
        assert_eq!(usage("/set_profile   "), "Usage: /set_profile <profile_info>");
    }
}
