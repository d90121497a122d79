//! palaver-signaling – TCP-Transport
//!
//! Dieser Crate bindet den TCP-Listener und faehrt pro Verbindung einen
//! eigenen tokio-Task. Die Verbindung liest Zeilen, treibt den
//! Anmelde-Ablauf und reicht danach jede Zeile an den `MessageRouter`.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (ChatServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  Anmeldung: Begruessung -> Wahl -> Username -> Passwort
//!     |  Sitzung:   Zeile -> MessageRouter::verarbeiten
//!     |             Ausgangs-Queue -> Socket
//!     v
//! MessageRouter::trennen (Teardown in einer Lock-Phase)
//! ```

pub mod connection;
pub mod error;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use connection::ClientConnection;
pub use error::{SignalingError, SignalingResult};
pub use server_state::{SignalingConfig, SignalingState};
pub use tcp::ChatServer;
