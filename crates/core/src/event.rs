//! Audit-Schnittstelle
//!
//! Der Router meldet Zustandsaenderungen und Fehler an ein `AuditLog`.
//! Die Implementierung (Datei, tracing) liegt im Observability-Crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Schweregrad eines Audit-Eintrags
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
    Critical,
}

impl AuditLevel {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.als_str())
    }
}

/// Append-only Audit-Trail
///
/// `record` darf nie blockieren und nie fehlschlagen: Fehler beim Schreiben
/// werden von der Implementierung geschluckt.
pub trait AuditLog: Send + Sync {
    fn record(&self, ereignis: &str, level: AuditLevel);
}

impl<T: AuditLog + ?Sized> AuditLog for std::sync::Arc<T> {
    fn record(&self, ereignis: &str, level: AuditLevel) {
        (**self).record(ereignis, level)
    }
}
