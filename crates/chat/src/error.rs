//! Fehlertypen fuer das Chat-Crate
//!
//! Der `Display`-Text jedes Fehlers ist die Zeile, die der betroffene Client
//! erhaelt. Der Router spiegelt jeden Fehler zusaetzlich ins Audit-Log.

use palaver_core::AuditLevel;
use thiserror::Error;

/// Grund einer gescheiterten Anmeldung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFehlschlag {
    BenutzernameVergeben,
    UngueltigeZugangsdaten,
    BereitsAngemeldet,
    SpeicherNichtVerfuegbar,
}

impl AuthFehlschlag {
    pub fn meldung(&self) -> &'static str {
        match self {
            Self::BenutzernameVergeben => "Username already taken. Disconnecting.",
            Self::UngueltigeZugangsdaten => "Invalid username or password. Disconnecting.",
            Self::BereitsAngemeldet => "User already logged in from another device.",
            Self::SpeicherNichtVerfuegbar => {
                "Authentication is currently unavailable. Disconnecting."
            }
        }
    }
}

/// Chat-Fehlertypen
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Unbekannter Befehl oder falsche Argumente; Sitzung laeuft weiter
    #[error("{0}")]
    Protokoll(String),

    /// Anmeldung gescheitert; Sitzung endet
    #[error("{}", .0.meldung())]
    Authentifizierung(AuthFehlschlag),

    /// Raum oder Benutzer existiert nicht; Sitzung laeuft weiter
    #[error("{0}")]
    NichtGefunden(String),

    /// Blockierung verhindert die Zustellung; Sitzung laeuft weiter
    #[error("{0}")]
    ZugriffVerweigert(String),

    /// Verbindung abgebrochen oder Zeile zu lang; Sitzung endet
    #[error("Connection error: {0}")]
    Transport(String),
}

impl ChatError {
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }

    pub fn nicht_gefunden(msg: impl Into<String>) -> Self {
        Self::NichtGefunden(msg.into())
    }

    pub fn verweigert(msg: impl Into<String>) -> Self {
        Self::ZugriffVerweigert(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Beendet dieser Fehler die Sitzung?
    pub fn ist_fatal(&self) -> bool {
        matches!(self, Self::Authentifizierung(_) | Self::Transport(_))
    }

    /// Schweregrad fuer das Audit-Log
    pub fn audit_level(&self) -> AuditLevel {
        match self {
            Self::Protokoll(_) | Self::NichtGefunden(_) => AuditLevel::Info,
            Self::ZugriffVerweigert(_) => AuditLevel::Warn,
            Self::Authentifizierung(AuthFehlschlag::SpeicherNichtVerfuegbar) => AuditLevel::Error,
            Self::Authentifizierung(_) => AuditLevel::Warn,
            Self::Transport(_) => AuditLevel::Error,
        }
    }

    /// Kurzname fuer Logs und Metriken
    pub fn art(&self) -> &'static str {
        match self {
            Self::Protokoll(_) => "protokoll",
            Self::Authentifizierung(_) => "authentifizierung",
            Self::NichtGefunden(_) => "nicht_gefunden",
            Self::ZugriffVerweigert(_) => "zugriff_verweigert",
            Self::Transport(_) => "transport",
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_ist_client_zeile() {
        assert_eq!(
            ChatError::verweigert("You are blocked by A.").to_string(),
            "You are blocked by A."
        );
        assert_eq!(
            ChatError::Authentifizierung(AuthFehlschlag::BereitsAngemeldet).to_string(),
            "User already logged in from another device."
        );
    }

    #[test]
    fn nur_auth_und_transport_sind_fatal() {
        assert!(!ChatError::protokoll("x").ist_fatal());
        assert!(!ChatError::nicht_gefunden("x").ist_fatal());
        assert!(!ChatError::verweigert("x").ist_fatal());
        assert!(ChatError::transport("reset").ist_fatal());
        assert!(ChatError::Authentifizierung(AuthFehlschlag::UngueltigeZugangsdaten).ist_fatal());
    }
}
