//! Fehlertypen fuer die gemeinsamen Typen

use thiserror::Error;

/// Gruende, aus denen ein Benutzername abgelehnt wird
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsernameFehler {
    #[error("Benutzername ist leer")]
    Leer,

    #[error("Benutzername zu lang: {laenge} Zeichen (Maximum: {max})")]
    ZuLang { laenge: usize, max: usize },

    #[error("Benutzername enthaelt ungueltiges Zeichen: {0:?}")]
    UngueltigesZeichen(char),

    #[error("Benutzername darf nicht mit '/' beginnen")]
    BefehlsPraefix,
}
