//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Die Schleife liest Frames, dispatcht sie synchron und
//! schreibt Antworten sowie Broadcaster-Frames zurueck auf den Socket.
//!
//! Kein Keepalive: ein haengender Peer faellt erst beim Socket-Schluss
//! auf. Beim Verbindungsende raeumt der Dispatcher Kopplung, Registry
//! und Warteschlange ab und informiert die Gegenseite.

use futures_util::{SinkExt, StreamExt};
use leitstelle_core::types::VerbindungsId;
use leitstelle_protocol::signal::{ErrorCode, SignalMessage};
use leitstelle_protocol::wire::{EmpfangenesFrame, FrameCodec, SendeFrame};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use crate::dispatcher::{DispatcherContext, MessageDispatcher};
use crate::server_state::VermittlungsState;

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `FrameCodec`, dispatcht an `MessageDispatcher` und
/// sendet Antworten zurueck. Laeuft in einem eigenen tokio-Task.
pub struct ClientConnection {
    state: Arc<VermittlungsState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<VermittlungsState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Diese Methode laeuft bis die Verbindung getrennt wird oder ein
    /// Shutdown-Signal eingeht.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let peer_addr = self.peer_addr;
        let verbindungs_id = VerbindungsId::new();

        tracing::info!(peer = %peer_addr, verbindung = %verbindungs_id, "Neue Verbindung");

        let codec = FrameCodec::with_max_size(self.state.config.max_frame_bytes);
        let mut framed = Framed::new(stream, codec);

        // Ausgehende Frames (Broadcaster -> TCP); der Sender landet beim
        // Authentifizieren im Broadcaster
        let (sende_tx, mut sende_rx) = mpsc::channel::<SendeFrame>(64);

        let mut ctx = DispatcherContext {
            verbindungs_id,
            peer_addr,
            sitzung: None,
            sende_tx,
        };
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        loop {
            tokio::select! {
                // Eingehendes Frame vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(EmpfangenesFrame::Gueltig(nachricht))) => {
                            tracing::trace!(
                                peer = %peer_addr,
                                typ = nachricht.typ_name(),
                                "Frame empfangen"
                            );

                            let ergebnis = dispatcher.dispatch(nachricht, &mut ctx);

                            let mut sende_fehler = false;
                            for antwort in ergebnis.antworten {
                                if let Err(e) = framed.send(antwort).await {
                                    tracing::warn!(
                                        peer = %peer_addr,
                                        fehler = %e,
                                        "Senden fehlgeschlagen"
                                    );
                                    sende_fehler = true;
                                    break;
                                }
                            }
                            if sende_fehler || ergebnis.trennen {
                                break;
                            }
                        }
                        Some(Ok(EmpfangenesFrame::Ungueltig { fehler })) => {
                            // Unlesbare Frames sind nie fatal, nur ein Fehler-Frame
                            tracing::debug!(
                                peer = %peer_addr,
                                fehler = %fehler,
                                "Unlesbares Frame"
                            );
                            let antwort = SignalMessage::fehler(
                                ErrorCode::MalformedFrame,
                                "Nachricht konnte nicht gelesen werden",
                            );
                            if framed.send(antwort).await.is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %e,
                                "Frame-Lesefehler"
                            );
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehendes Frame aus dem Broadcaster
                Some(ausgehend) = sende_rx.recv() => {
                    if let Err(e) = framed.send(ausgehend).await {
                        tracing::warn!(
                            peer = %peer_addr,
                            fehler = %e,
                            "Broadcast-Senden fehlgeschlagen"
                        );
                        break;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                        let abschied = SignalMessage::fehler(
                            ErrorCode::InternalError,
                            "Server wird heruntergefahren",
                        );
                        let _ = framed.send(abschied).await;
                        break;
                    }
                }
            }
        }

        dispatcher.verbindung_bereinigen(&ctx);
        tracing::info!(peer = %peer_addr, verbindung = %verbindungs_id, "Verbindungs-Task beendet");
    }
}
