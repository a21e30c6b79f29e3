//! Gemeinsame Identifikations- und Rollentypen fuer Leitstelle
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Verbindungs-ID
///
/// Wird beim Annehmen eines Sockets vergeben und bleibt fuer die gesamte
/// Lebensdauer der Verbindung stabil. Auf dem Draht erscheint sie als
/// nackter UUID-String.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerbindungsId(pub Uuid);

impl VerbindungsId {
    /// Erstellt eine neue zufaellige VerbindungsId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for VerbindungsId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VerbindungsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "verbindung:{}", self.0)
    }
}

/// Rolle einer authentifizierten Verbindung
///
/// Jede registrierte Verbindung traegt genau eine Rolle; dieselbe Rolle
/// steckt im Sitzungs-Token und entscheidet, welche Frames die Verbindung
/// senden darf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rolle {
    Caller,
    Operator,
}

impl Rolle {
    /// Stabiler String fuer Token-Claims und Logausgaben
    pub fn als_str(&self) -> &'static str {
        match self {
            Rolle::Caller => "caller",
            Rolle::Operator => "operator",
        }
    }

    /// Parst den Claim-String zurueck in die Rolle
    pub fn aus_str(s: &str) -> Option<Self> {
        match s {
            "caller" => Some(Rolle::Caller),
            "operator" => Some(Rolle::Operator),
            _ => None,
        }
    }
}

impl std::fmt::Display for Rolle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}
