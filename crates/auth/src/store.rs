//! Zugangsdaten-Speicher
//!
//! Der Router kennt nur den `CredentialStore`-Trait. Zugriffe auf den
//! Speicher sind pro Instanz serialisiert (eigener Mutex), unabhaengig vom
//! Chat-Zustand.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use palaver_core::Username;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::{AuthError, AuthResult};
use crate::password::{passwort_hashen, passwort_verifizieren, HashParameter};

/// Schnittstelle zum Zugangsdaten-Speicher
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Legt eine neue Identitaet an.
    ///
    /// Gibt `AuthError::BenutzernameVergeben` zurueck wenn der Name existiert.
    async fn register(&self, username: &Username, passwort: &str) -> AuthResult<()>;

    /// Prueft Benutzername und Passwort. Unbekannte Namen ergeben `Ok(false)`.
    async fn verify(&self, username: &Username, passwort: &str) -> AuthResult<bool>;
}

/// Argon2 ist CPU-lastig und laeuft deshalb auf dem Blocking-Pool
async fn hashen_im_hintergrund(passwort: &str, parameter: HashParameter) -> AuthResult<String> {
    let passwort = passwort.to_owned();
    tokio::task::spawn_blocking(move || passwort_hashen(&passwort, parameter))
        .await
        .map_err(|e| AuthError::intern(format!("Hash-Task abgebrochen: {e}")))?
}

async fn verifizieren_im_hintergrund(passwort: &str, hash: String) -> AuthResult<bool> {
    let passwort = passwort.to_owned();
    tokio::task::spawn_blocking(move || passwort_verifizieren(&passwort, &hash))
        .await
        .map_err(|e| AuthError::intern(format!("Verifikations-Task abgebrochen: {e}")))?
}

// ---------------------------------------------------------------------------
// InMemoryCredentialStore
// ---------------------------------------------------------------------------

/// Fluechtiger Speicher, haelt nur Hashes im Prozess
pub struct InMemoryCredentialStore {
    parameter: HashParameter,
    hashes: Mutex<HashMap<Username, String>>,
}

impl InMemoryCredentialStore {
    pub fn neu(parameter: HashParameter) -> Self {
        Self {
            parameter,
            hashes: Mutex::new(HashMap::new()),
        }
    }

    pub async fn anzahl(&self) -> usize {
        self.hashes.lock().await.len()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn register(&self, username: &Username, passwort: &str) -> AuthResult<()> {
        let mut hashes = self.hashes.lock().await;
        if hashes.contains_key(username) {
            return Err(AuthError::BenutzernameVergeben(username.to_string()));
        }
        let hash = hashen_im_hintergrund(passwort, self.parameter).await?;
        hashes.insert(username.clone(), hash);
        Ok(())
    }

    async fn verify(&self, username: &Username, passwort: &str) -> AuthResult<bool> {
        let hash = self.hashes.lock().await.get(username).cloned();
        match hash {
            Some(hash) => verifizieren_im_hintergrund(passwort, hash).await,
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// FileCredentialStore
// ---------------------------------------------------------------------------

/// Benutzerdatei mit einer Zeile `benutzername:phc-hash` pro Identitaet
///
/// Die Datei wird beim Oeffnen vollstaendig gelesen; neue Registrierungen
/// werden angehaengt. Der Mutex wird waehrend des Schreibens gehalten, damit
/// zwei gleichzeitige Registrierungen desselben Namens nicht beide gelingen.
pub struct FileCredentialStore {
    pfad: PathBuf,
    parameter: HashParameter,
    eintraege: Mutex<HashMap<Username, String>>,
}

impl FileCredentialStore {
    /// Oeffnet (oder erstellt) die Benutzerdatei
    pub async fn oeffnen(pfad: impl Into<PathBuf>, parameter: HashParameter) -> AuthResult<Self> {
        let pfad = pfad.into();
        let eintraege = match tokio::fs::read_to_string(&pfad).await {
            Ok(inhalt) => zeilen_parsen(&pfad, &inhalt),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::File::create(&pfad).await?;
                tracing::info!(pfad = %pfad.display(), "Benutzerdatei angelegt");
                HashMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            pfad = %pfad.display(),
            benutzer = eintraege.len(),
            "Benutzerdatei geladen"
        );

        Ok(Self {
            pfad,
            parameter,
            eintraege: Mutex::new(eintraege),
        })
    }

    pub fn pfad(&self) -> &Path {
        &self.pfad
    }

    pub async fn anzahl(&self) -> usize {
        self.eintraege.lock().await.len()
    }
}

fn zeilen_parsen(pfad: &Path, inhalt: &str) -> HashMap<Username, String> {
    let mut eintraege = HashMap::new();

    for (nr, zeile) in inhalt.lines().enumerate() {
        let zeile = zeile.trim();
        if zeile.is_empty() {
            continue;
        }
        let Some((name, hash)) = zeile.split_once(':') else {
            tracing::warn!(pfad = %pfad.display(), zeile = nr + 1, "Zeile ohne ':' ignoriert");
            continue;
        };
        let Ok(username) = Username::parse(name) else {
            tracing::warn!(pfad = %pfad.display(), zeile = nr + 1, "Ungueltiger Benutzername ignoriert");
            continue;
        };
        if !hash.starts_with('$') {
            tracing::warn!(
                pfad = %pfad.display(),
                zeile = nr + 1,
                username = %username,
                "Eintrag ohne PHC-Hash ignoriert"
            );
            continue;
        }
        if eintraege.contains_key(&username) {
            tracing::warn!(username = %username, "Doppelter Eintrag, erster bleibt gueltig");
            continue;
        }
        eintraege.insert(username, hash.to_string());
    }

    eintraege
}

/// Haengt eine Zeile an die Benutzerdatei an
///
/// Endet die Datei nicht mit `\n` (von Hand bearbeitet oder halb
/// geschriebener Eintrag), wird zuerst ein Zeilenumbruch geschrieben.
async fn eintrag_anhaengen(pfad: &Path, zeile: &str) -> std::io::Result<()> {
    let mut datei = tokio::fs::OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(pfad)
        .await?;

    let mut puffer = String::with_capacity(zeile.len() + 2);
    if datei.metadata().await?.len() > 0 {
        let mut letztes = [0u8; 1];
        datei.seek(SeekFrom::End(-1)).await?;
        datei.read_exact(&mut letztes).await?;
        if letztes[0] != b'\n' {
            tracing::warn!(pfad = %pfad.display(), "Benutzerdatei endete ohne Zeilenumbruch");
            puffer.push('\n');
        }
    }
    puffer.push_str(zeile);
    puffer.push('\n');

    datei.write_all(puffer.as_bytes()).await?;
    datei.flush().await
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn register(&self, username: &Username, passwort: &str) -> AuthResult<()> {
        let mut eintraege = self.eintraege.lock().await;
        if eintraege.contains_key(username) {
            return Err(AuthError::BenutzernameVergeben(username.to_string()));
        }

        let hash = hashen_im_hintergrund(passwort, self.parameter).await?;

        eintrag_anhaengen(&self.pfad, &format!("{username}:{hash}")).await?;

        eintraege.insert(username.clone(), hash);
        tracing::info!(username = %username, "Neuer Benutzer registriert");
        Ok(())
    }

    async fn verify(&self, username: &Username, passwort: &str) -> AuthResult<bool> {
        let hash = self.eintraege.lock().await.get(username).cloned();
        match hash {
            Some(hash) => {
                let korrekt = verifizieren_im_hintergrund(passwort, hash).await?;
                if !korrekt {
                    tracing::warn!(username = %username, "Fehlgeschlagener Login-Versuch");
                }
                Ok(korrekt)
            }
            None => Ok(false),
        }
    }
}
