//! Audit-Trail
//!
//! Jeder Eintrag wird nach tracing gespiegelt. `FileAuditLog` haengt ihn
//! zusaetzlich als `[YYYY-MM-DD HH:MM:SS] [LEVEL] text` an eine Datei an.
//! Geschrieben wird von einem Hintergrund-Task; `record` blockiert nie.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use palaver_core::{AuditLevel, AuditLog};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Groesse der Schreib-Queue
const AUDIT_QUEUE_GROESSE: usize = 1024;

fn spiegeln(ereignis: &str, level: AuditLevel) {
    match level {
        AuditLevel::Info => tracing::info!(target: "audit", "{ereignis}"),
        AuditLevel::Warn => tracing::warn!(target: "audit", "{ereignis}"),
        AuditLevel::Error | AuditLevel::Critical => {
            tracing::error!(target: "audit", level = %level, "{ereignis}")
        }
    }
}

/// Formatiert eine Zeile der Audit-Datei (mit Zeilenumbruch)
pub fn audit_zeile(ereignis: &str, level: AuditLevel) -> String {
    format!(
        "[{}] [{}] {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level,
        ereignis
    )
}

// ---------------------------------------------------------------------------
// TracingAuditLog
// ---------------------------------------------------------------------------

/// Audit-Log ohne Datei, nur tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn record(&self, ereignis: &str, level: AuditLevel) {
        spiegeln(ereignis, level);
    }
}

// ---------------------------------------------------------------------------
// FileAuditLog
// ---------------------------------------------------------------------------

/// Append-only Audit-Datei
pub struct FileAuditLog {
    tx: mpsc::Sender<String>,
    gesund: Arc<AtomicBool>,
}

impl FileAuditLog {
    /// Oeffnet (oder erstellt) die Datei und startet den Schreib-Task
    ///
    /// Der Task endet, sobald alle Handles gedroppt sind und die Queue leer
    /// ist.
    pub async fn oeffnen(pfad: impl Into<PathBuf>) -> Result<(Self, JoinHandle<()>)> {
        let pfad = pfad.into();
        let datei = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&pfad)
            .await
            .with_context(|| format!("Audit-Datei {} nicht oeffenbar", pfad.display()))?;

        let (tx, rx) = mpsc::channel(AUDIT_QUEUE_GROESSE);
        let gesund = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(schreib_task(datei, rx, Arc::clone(&gesund), pfad));

        Ok((Self { tx, gesund }, task))
    }

    /// Flag fuer den Health-Check; `false` nach dem ersten Schreibfehler
    pub fn gesund_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.gesund)
    }
}

impl AuditLog for FileAuditLog {
    fn record(&self, ereignis: &str, level: AuditLevel) {
        spiegeln(ereignis, level);

        match self.tx.try_send(audit_zeile(ereignis, level)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Audit-Queue voll, Eintrag verworfen");
                self.gesund.store(false, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Audit-Schreiber beendet, Eintrag verworfen");
                self.gesund.store(false, Ordering::Relaxed);
            }
        }
    }
}

async fn schreib_task(
    mut datei: tokio::fs::File,
    mut rx: mpsc::Receiver<String>,
    gesund: Arc<AtomicBool>,
    pfad: PathBuf,
) {
    while let Some(zeile) = rx.recv().await {
        let ergebnis = async {
            datei.write_all(zeile.as_bytes()).await?;
            datei.flush().await
        }
        .await;

        if let Err(e) = ergebnis {
            if gesund.swap(false, Ordering::Relaxed) {
                tracing::error!(pfad = %pfad.display(), fehler = %e, "Audit-Datei nicht schreibbar");
            }
        }
    }
    tracing::debug!(pfad = %pfad.display(), "Audit-Schreiber beendet");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeilenformat() {
        let zeile = audit_zeile("Server started on 0.0.0.0:12345", AuditLevel::Info);
        // [2024-01-01 12:00:00] [INFO] ...
        assert_eq!(&zeile[0..1], "[");
        assert_eq!(&zeile[20..28], "] [INFO]");
        assert!(zeile.ends_with(" Server started on 0.0.0.0:12345\n"));
    }

    #[tokio::test]
    async fn datei_erhaelt_eintraege_in_reihenfolge() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("server.log");

        let (audit, task) = FileAuditLog::oeffnen(&pfad).await.unwrap();
        let gesund = audit.gesund_flag();
        audit.record("erster", AuditLevel::Info);
        audit.record("zweiter", AuditLevel::Critical);
        drop(audit);
        task.await.unwrap();

        let inhalt = std::fs::read_to_string(&pfad).unwrap();
        let zeilen: Vec<&str> = inhalt.lines().collect();
        assert_eq!(zeilen.len(), 2);
        assert!(zeilen[0].ends_with("[INFO] erster"));
        assert!(zeilen[1].ends_with("[CRITICAL] zweiter"));
        assert!(gesund.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn bestehende_datei_wird_ergaenzt() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("server.log");
        std::fs::write(&pfad, "alt\n").unwrap();

        let (audit, task) = FileAuditLog::oeffnen(&pfad).await.unwrap();
        audit.record("neu", AuditLevel::Warn);
        drop(audit);
        task.await.unwrap();

        let inhalt = std::fs::read_to_string(&pfad).unwrap();
        assert!(inhalt.starts_with("alt\n"));
        assert!(inhalt.trim_end().ends_with("[WARN] neu"));
    }

    #[tokio::test]
    async fn ungueltiger_pfad_ist_fehler() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("gibt/es/nicht/server.log");
        assert!(FileAuditLog::oeffnen(pfad).await.is_err());
    }

    #[test]
    fn tracing_audit_ist_no_op_sicher() {
        TracingAuditLog.record("nur tracing", AuditLevel::Error);
    }
}
