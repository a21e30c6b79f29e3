//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};

use leitstelle_protocol::wire::DEFAULT_MAX_FRAME_SIZE;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Token- und Challenge-Einstellungen
    pub auth: AuthEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Eingebettetes Identitaets-Verzeichnis (Geraete und Operator-Konten)
    pub verzeichnis: VerzeichnisEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen auf der Vermittlung
    pub max_clients: u32,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Leitstelle".into(),
            max_clients: 256,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer alle Listener
    pub bind_adresse: String,
    /// Port fuer die TCP-Vermittlung (Signal-Frames)
    pub signal_port: u16,
    /// Port fuer die REST-API (Challenge/Auth/Login)
    pub api_port: u16,
    /// Maximale Frame-Groesse auf der Vermittlung in Bytes
    pub max_frame_bytes: usize,
    /// CORS-Origins fuer REST (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            signal_port: 8081,
            api_port: 8080,
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
            cors_origins: vec![],
        }
    }
}

/// Token- und Challenge-Einstellungen
///
/// Ohne `token_geheimnis` erzeugt der Server beim Start ein zufaelliges
/// Geheimnis; ausgestellte Tokens ueberleben dann keinen Neustart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEinstellungen {
    /// Geheimnis fuer die Token-Signierung (HS256)
    pub token_geheimnis: Option<String>,
    /// Lebensdauer von Caller-Tokens in Sekunden
    pub caller_ttl_sekunden: Option<i64>,
    /// Lebensdauer von Operator-Tokens in Sekunden
    pub operator_ttl_sekunden: Option<i64>,
    /// Lebensdauer von Challenges in Sekunden
    pub challenge_ttl_sekunden: Option<i64>,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Eingebettetes Identitaets-Verzeichnis
///
/// Ersetzt in dieser Ausbaustufe ein externes Geraete-Register: die
/// Eintraege landen beim Start im In-Memory-Verzeichnis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerzeichnisEinstellungen {
    /// Oeffentliche Ed25519-Schluessel registrierter Geraete (Base64)
    pub geraete: Vec<String>,
    /// Operator-Konten
    pub operatoren: Vec<OperatorKonto>,
}

/// Ein Operator-Konto aus der Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorKonto {
    pub username: String,
    /// Fertiger Argon2-Hash; hat Vorrang vor `passwort`
    #[serde(default)]
    pub passwort_hash: Option<String>,
    /// Klartext-Passwort, wird beim Start gehasht (nur fuer Entwicklung)
    #[serde(default)]
    pub passwort: Option<String>,
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer die TCP-Vermittlung zurueck
    pub fn signal_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.signal_port)
    }

    /// Gibt die vollstaendige Bind-Adresse fuer die REST-API zurueck
    pub fn api_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.api_port)
    }
}
