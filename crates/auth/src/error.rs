//! Fehlertypen fuer den Zugangsdaten-Speicher

use thiserror::Error;

/// Alle moeglichen Fehler im Auth-Crate
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Passwort ---
    #[error("Passwort-Hashing fehlgeschlagen: {0}")]
    PasswortHashing(String),

    // --- Benutzerverwaltung ---
    #[error("Benutzername bereits vergeben: {0}")]
    BenutzernameVergeben(String),

    // --- Speicher ---
    #[error("Benutzerdatei nicht lesbar/schreibbar: {0}")]
    Io(#[from] std::io::Error),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Alias fuer das Auth-Crate
pub type AuthResult<T> = Result<T, AuthError>;
