//! Fehlertypen fuer den Transport

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Fehlertyp fuer den Transport
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Eingehende Zeile ueberschreitet das Limit
    #[error("Zeile zu lang (Limit {0} Bytes)")]
    ZeileZuLang(usize),
}

impl SignalingError {
    /// Uebersetzt einen Codec-Fehler
    pub fn aus_codec(fehler: LinesCodecError, limit: usize) -> Self {
        match fehler {
            LinesCodecError::MaxLineLengthExceeded => Self::ZeileZuLang(limit),
            LinesCodecError::Io(e) => Self::Io(e),
        }
    }
}

/// Result-Typ fuer den Transport
pub type SignalingResult<T> = Result<T, SignalingError>;
