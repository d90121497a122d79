//! palaver-auth – Zugangsdaten fuer palaver
//!
//! Dieses Crate implementiert:
//! - Passwort-Hashing mit Argon2id
//! - `CredentialStore`-Trait (Registrierung, Verifikation)
//! - `FileCredentialStore`: Benutzerdatei, eine Zeile `name:hash` pro Identitaet
//! - `InMemoryCredentialStore`: fluechtiger Speicher fuer Tests und Demos

pub mod error;
pub mod password;
pub mod store;

// Bequeme Re-Exporte
pub use error::{AuthError, AuthResult};
pub use password::{passwort_hashen, passwort_verifizieren, HashParameter};
pub use store::{CredentialStore, FileCredentialStore, InMemoryCredentialStore};
