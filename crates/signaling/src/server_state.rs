//! Geteilter Zustand des Vermittlungs-Servers
//!
//! Ein `VermittlungsState` wird beim Start erzeugt und per Arc an alle
//! Verbindungs-Tasks gereicht. Er buendelt Konfiguration, Token-Pruefung,
//! Vermittlungszustand und den Event-Broadcaster.

use crate::broadcast::EventBroadcaster;
use crate::vermittlung::Vermittlung;
use leitstelle_auth::token::TokenDienst;
use leitstelle_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use std::sync::Arc;
use std::time::Instant;

/// Konfiguration des Vermittlungs-Servers
#[derive(Clone, Debug)]
pub struct VermittlungsConfig {
    /// Anzeigename des Servers
    pub server_name: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: u32,
    /// Maximale Groesse eines einzelnen Frames in Bytes
    pub max_frame_bytes: usize,
}

impl Default for VermittlungsConfig {
    fn default() -> Self {
        Self {
            server_name: "Leitstelle".to_string(),
            max_clients: 256,
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Geteilter Serverzustand fuer alle Verbindungs-Tasks
pub struct VermittlungsState {
    /// Server-Konfiguration
    pub config: Arc<VermittlungsConfig>,
    /// Prueft Sitzungs-Token aus dem Auth-Gateway
    pub token_dienst: Arc<TokenDienst>,
    /// Registry und Warteschlange unter einem Lock
    pub vermittlung: Vermittlung,
    /// Versandweg zu allen authentifizierten Verbindungen
    pub broadcaster: EventBroadcaster,
    /// Startzeitpunkt fuer Uptime-Angaben
    start_zeit: Instant,
}

impl VermittlungsState {
    /// Erstellt den Serverzustand
    pub fn neu(config: VermittlungsConfig, token_dienst: Arc<TokenDienst>) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            token_dienst,
            vermittlung: Vermittlung::neu(),
            broadcaster: EventBroadcaster::neu(),
            start_zeit: Instant::now(),
        })
    }

    /// Laufzeit des Servers in Sekunden
    pub fn uptime_sek(&self) -> u64 {
        self.start_zeit.elapsed().as_secs()
    }
}
