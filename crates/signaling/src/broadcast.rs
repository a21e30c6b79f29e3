//! Event-Broadcaster – Sendet Frames an verbundene Clients
//!
//! Der EventBroadcaster kennt die Send-Queues aller authentifizierten
//! Verbindungen und stellt zwei Versandwege bereit:
//! - Gezielt an eine Verbindung: `an_verbindung_senden` (Relay, Anrufer-Status)
//! - An alle Operatoren: `an_operatoren_senden` (Registry- und Queue-Deltas)
//!
//! Operator-Broadcasts serialisieren die Nachricht genau einmal und
//! verteilen dann denselben Body an alle Queues. Versand ist fire-and-forget:
//! volle oder geschlossene Queues werden uebersprungen, der Eintrag bleibt
//! bestehen – abraeumen tut ausschliesslich der Schliess-Pfad der Verbindung.

use dashmap::DashMap;
use leitstelle_core::types::{Rolle, VerbindungsId};
use leitstelle_protocol::signal::SignalMessage;
use leitstelle_protocol::wire::SendeFrame;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer verbundenen Gegenstelle
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub verbindungs_id: VerbindungsId,
    pub rolle: Rolle,
    pub tx: mpsc::Sender<SendeFrame>,
}

impl ClientSender {
    /// Reiht ein Frame nicht-blockierend in die Send-Queue ein
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, frame: SendeFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    verbindung = %self.verbindungs_id,
                    "Send-Queue voll – Frame verworfen"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    verbindung = %self.verbindungs_id,
                    "Send-Queue geschlossen (Verbindung getrennt)"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Broadcaster fuer alle verbundenen Clients
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    /// Client-Sender, indiziert nach VerbindungsId
    clients: DashMap<VerbindungsId, ClientSender>,
}

impl EventBroadcaster {
    /// Erstellt einen neuen EventBroadcaster
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                clients: DashMap::new(),
            }),
        }
    }

    /// Registriert die Send-Queue einer authentifizierten Verbindung
    ///
    /// Die `ClientConnection` liest aus der Gegenseite dieser Queue und
    /// schreibt die Frames auf den Socket.
    pub fn registrieren(
        &self,
        verbindungs_id: VerbindungsId,
        rolle: Rolle,
        tx: mpsc::Sender<SendeFrame>,
    ) {
        self.inner.clients.insert(
            verbindungs_id,
            ClientSender {
                verbindungs_id,
                rolle,
                tx,
            },
        );
        tracing::debug!(verbindung = %verbindungs_id, rolle = %rolle, "Client im Broadcaster registriert");
    }

    /// Entfernt eine Verbindung aus dem Broadcaster
    pub fn entfernen(&self, verbindungs_id: &VerbindungsId) {
        self.inner.clients.remove(verbindungs_id);
        tracing::debug!(verbindung = %verbindungs_id, "Client aus Broadcaster entfernt");
    }

    /// Sendet ein Frame an eine einzelne Verbindung
    ///
    /// Gibt `true` zurueck wenn die Verbindung bekannt war und das Frame
    /// eingereiht wurde.
    pub fn an_verbindung_senden(&self, verbindungs_id: &VerbindungsId, frame: SendeFrame) -> bool {
        match self.inner.clients.get(verbindungs_id) {
            Some(sender) => sender.senden(frame),
            None => {
                tracing::debug!(verbindung = %verbindungs_id, "Senden an unbekannte Verbindung");
                false
            }
        }
    }

    /// Sendet eine Nachricht an alle verbundenen Operatoren
    ///
    /// Die Nachricht wird genau einmal serialisiert; alle Queues erhalten
    /// denselben Body. Gibt die Anzahl der erfolgreichen Einreihungen
    /// zurueck.
    pub fn an_operatoren_senden(&self, nachricht: &SignalMessage) -> usize {
        let body: Arc<str> = match nachricht.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                tracing::error!(typ = nachricht.typ_name(), fehler = %e, "Broadcast nicht serialisierbar");
                return 0;
            }
        };

        let mut eingereiht = 0;
        self.inner.clients.iter().for_each(|entry| {
            if entry.value().rolle != Rolle::Operator {
                return;
            }
            if entry.value().senden(SendeFrame::Serialisiert(Arc::clone(&body))) {
                eingereiht += 1;
            }
        });
        eingereiht
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_registriert(&self, verbindungs_id: &VerbindungsId) -> bool {
        self.inner.clients.contains_key(verbindungs_id)
    }

    /// Gibt die Anzahl der registrierten Verbindungen zurueck
    pub fn anzahl(&self) -> usize {
        self.inner.clients.len()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
