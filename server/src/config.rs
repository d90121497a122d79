//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use palaver_auth::HashParameter;
use palaver_chat::ChatEinstellungen;
use palaver_observability::logging::{log_format_gueltig, log_level_gueltig};
use palaver_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Chat-Einstellungen (Verlauf, Stummschaltung)
    pub chat: ChatKonfig,
    /// Zugangsdaten-Speicher und Hash-Kosten
    pub auth: AuthEinstellungen,
    /// Logging- und Audit-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "palaver".into(),
            max_clients: 512,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer Chat und Observability
    pub bind_adresse: String,
    /// Port fuer das Zeilen-Protokoll
    pub tcp_port: u16,
    /// Maximale Laenge einer eingehenden Zeile
    pub zeilenlimit_bytes: usize,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: 12345,
            zeilenlimit_bytes: 4096,
        }
    }
}

/// Chat-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatKonfig {
    /// Eintraege pro Verlaufsabfrage
    pub anzeige_limit: usize,
    /// Gespeicherte Eintraege pro Raum bzw. Paar (0 = unbegrenzt)
    pub verlauf_limit: usize,
    /// Inhalte stummgeschalteter Absender ausfiltern
    pub stumm_filter: bool,
}

impl Default for ChatKonfig {
    fn default() -> Self {
        let standard = ChatEinstellungen::default();
        Self {
            anzeige_limit: standard.anzeige_limit,
            verlauf_limit: standard.verlauf_limit,
            stumm_filter: standard.stumm_filter,
        }
    }
}

/// Zugangsdaten-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEinstellungen {
    /// Benutzerdatei, eine Zeile `name:hash` pro Identitaet
    pub benutzer_datei: String,
    /// Argon2 Speicherkosten in KiB
    pub hash_speicher_kib: u32,
    /// Argon2 Iterationen
    pub hash_iterationen: u32,
}

impl Default for AuthEinstellungen {
    fn default() -> Self {
        let standard = HashParameter::default();
        Self {
            benutzer_datei: "users.txt".into(),
            hash_speicher_kib: standard.speicher_kib,
            hash_iterationen: standard.iterationen,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
    /// Audit-Datei (None = Audit nur ueber tracing)
    pub audit_datei: Option<String>,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
            audit_datei: Some("server.log".into()),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config: Self = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.pruefen()?;
        Ok(config)
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if self.server.max_clients == 0 {
            anyhow::bail!("server.max_clients muss groesser als 0 sein");
        }
        if self.netzwerk.zeilenlimit_bytes == 0 {
            anyhow::bail!("netzwerk.zeilenlimit_bytes muss groesser als 0 sein");
        }
        if self.chat.anzeige_limit == 0 {
            anyhow::bail!("chat.anzeige_limit muss groesser als 0 sein");
        }
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!("logging.level '{}' ist ungueltig", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("logging.format '{}' ist ungueltig", self.logging.format);
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn tcp_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.tcp_port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }

    pub fn chat_einstellungen(&self) -> ChatEinstellungen {
        ChatEinstellungen {
            anzeige_limit: self.chat.anzeige_limit,
            verlauf_limit: self.chat.verlauf_limit,
            stumm_filter: self.chat.stumm_filter,
        }
    }

    pub fn hash_parameter(&self) -> HashParameter {
        HashParameter {
            speicher_kib: self.auth.hash_speicher_kib,
            iterationen: self.auth.hash_iterationen,
        }
    }

    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            max_clients: self.server.max_clients,
            zeilenlimit_bytes: self.netzwerk.zeilenlimit_bytes,
        }
    }
}
