//! palaver-chat – Sitzungs- und Nachrichten-Routing
//!
//! Dieses Crate implementiert den gemeinsamen Chat-Zustand:
//! - `SessionRegistry`: eine Sitzung pro Identitaet, Praesenz-Status
//! - `RoomDirectory`: Raum-Mitgliedschaft, Raum-Broadcasts, Auto-Loeschung
//! - `RelationshipStore`: Stumm- und Blocklisten
//! - `HistoryStore`: begrenzter Verlauf pro Raum und pro Privat-Paar
//! - `MessageRouter`: Befehls-Dispatch, einziger Mutator aller Stores
//!
//! Der Transport (TCP, Zeilen-Codec) liegt in `palaver-signaling`.
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use palaver_auth::{HashParameter, InMemoryCredentialStore};
//! use palaver_chat::{ChatEinstellungen, MessageRouter};
//! use palaver_core::{AuditLevel, AuditLog};
//!
//! struct Stumm;
//! impl AuditLog for Stumm {
//!     fn record(&self, _: &str, _: AuditLevel) {}
//! }
//!
//! let store = Arc::new(InMemoryCredentialStore::neu(HashParameter::default()));
//! let router = MessageRouter::neu(store, Arc::new(Stumm), ChatEinstellungen::default());
//! assert_eq!(router.online_anzahl(), 0);
//! ```

pub mod command;
pub mod error;
pub mod history;
pub mod login;
pub mod registry;
pub mod relationships;
pub mod rooms;
pub mod router;
pub mod types;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use command::Befehl;
pub use error::{AuthFehlschlag, ChatError, ChatResult};
pub use history::{HistoryStore, ANZEIGE_LIMIT};
pub use login::{AblaufAktion, Anmeldeablauf, Anmeldedaten, VerbindungsPhase, Wahl};
pub use registry::{ClientSender, RegisterErgebnis, SessionRegistry, ZustellBilanz, SEND_QUEUE_GROESSE};
pub use relationships::{BeziehungsErgebnis, RelationshipStore};
pub use rooms::{CreateErgebnis, JoinErgebnis, LeaveErgebnis, RoomDirectory};
pub use router::{Anmeldung, ChatEinstellungen, MessageRouter, Verarbeitung};
pub use types::{Ausgang, Nachricht, PaarSchluessel, Scope, Zustellung};
