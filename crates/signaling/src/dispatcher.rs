//! Message-Dispatcher – Routet Signal-Nachrichten an die richtigen Handler
//!
//! Der Dispatcher erhaelt dekodierte Frames von einer ClientConnection,
//! bestimmt den zustaendigen Handler und gibt die Antwort-Frames zurueck.
//!
//! ## Zustandspruefung
//! Das erste Frame jeder Verbindung muss ein `Authenticate` sein:
//! - Jedes andere Frame vor der Anmeldung ergibt ein NotAuthenticated-Frame,
//!   die Verbindung bleibt offen
//! - Ein fehlgeschlagenes `Authenticate` ergibt ein Fehler-Frame und beendet
//!   die Verbindung
//! - Ein zweites `Authenticate` wird als MalformedFrame abgelehnt

use leitstelle_auth::token::SitzungsIdentitaet;
use leitstelle_core::types::{Rolle, VerbindungsId};
use leitstelle_protocol::signal::{ErrorCode, SignalMessage};
use leitstelle_protocol::wire::SendeFrame;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::handlers::{anruf_handler, auth_handler, relay_handler};
use crate::server_state::VermittlungsState;

/// Dispatcher-Kontext – Informationen ueber die aktuelle Verbindung
pub struct DispatcherContext {
    /// Verbindungs-ID, beim Accept vergeben
    pub verbindungs_id: VerbindungsId,
    /// Peer-Adresse fuer Log-Ausgaben
    pub peer_addr: SocketAddr,
    /// Geprueftes Sitzungs-Token (None vor der Authentifizierung)
    pub sitzung: Option<SitzungsIdentitaet>,
    /// Send-Queue der eigenen Verbindung, wird beim Authentifizieren
    /// im Broadcaster hinterlegt
    pub sende_tx: mpsc::Sender<SendeFrame>,
}

/// Ergebnis einer Dispatch-Runde
///
/// `antworten` gehen in Reihenfolge an den Absender zurueck; `trennen`
/// beendet die Verbindung nach dem Versand.
#[derive(Debug, Default)]
pub struct DispatchErgebnis {
    pub antworten: Vec<SignalMessage>,
    pub trennen: bool,
}

impl DispatchErgebnis {
    /// Keine Antwort an den Absender
    pub fn keine() -> Self {
        Self::default()
    }

    /// Genau eine Antwort an den Absender
    pub fn eine(antwort: SignalMessage) -> Self {
        Self {
            antworten: vec![antwort],
            trennen: false,
        }
    }

    /// Eine Antwort, danach wird die Verbindung beendet
    pub fn fatal(antwort: SignalMessage) -> Self {
        Self {
            antworten: vec![antwort],
            trennen: true,
        }
    }
}

/// Zentraler Message-Dispatcher
///
/// Routet eingehende Signal-Nachrichten an die entsprechenden Handler.
/// Alle Handler arbeiten synchron auf dem geteilten Zustand; Socket-IO
/// findet ausschliesslich in der ClientConnection statt.
pub struct MessageDispatcher {
    state: Arc<VermittlungsState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<VermittlungsState>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine eingehende Signal-Nachricht
    pub fn dispatch(
        &self,
        nachricht: SignalMessage,
        ctx: &mut DispatcherContext,
    ) -> DispatchErgebnis {
        match nachricht {
            // -------------------------------------------------------------------
            // Authentifizierung (erstes Frame jeder Verbindung)
            // -------------------------------------------------------------------
            SignalMessage::Authenticate(frame) => {
                if ctx.sitzung.is_some() {
                    return DispatchErgebnis::eine(SignalMessage::fehler(
                        ErrorCode::MalformedFrame,
                        "Bereits authentifiziert",
                    ));
                }
                auth_handler::handle_authenticate(frame, ctx, &self.state)
            }

            // -------------------------------------------------------------------
            // Alles andere erfordert eine authentifizierte Sitzung
            // -------------------------------------------------------------------
            nachricht => {
                let rolle = match &ctx.sitzung {
                    Some(sitzung) => sitzung.rolle,
                    None => {
                        tracing::debug!(
                            verbindung = %ctx.verbindungs_id,
                            typ = nachricht.typ_name(),
                            "Frame vor der Authentifizierung"
                        );
                        return DispatchErgebnis::eine(SignalMessage::fehler(
                            ErrorCode::NotAuthenticated,
                            "Zuerst authentifizieren",
                        ));
                    }
                };
                self.dispatch_authentifiziert(nachricht, ctx.verbindungs_id, rolle)
            }
        }
    }

    /// Routet Nachrichten die eine authentifizierte Sitzung erfordern
    fn dispatch_authentifiziert(
        &self,
        nachricht: SignalMessage,
        verbindungs_id: VerbindungsId,
        rolle: Rolle,
    ) -> DispatchErgebnis {
        match nachricht {
            // -------------------------------------------------------------------
            // Anruf-Nachrichten
            // -------------------------------------------------------------------
            SignalMessage::RequestCall => {
                anruf_handler::handle_request_call(verbindungs_id, rolle, &self.state)
            }

            SignalMessage::TakeCall(frame) => {
                anruf_handler::handle_take_call(frame, verbindungs_id, rolle, &self.state)
            }

            SignalMessage::EndCall => anruf_handler::handle_end_call(verbindungs_id, &self.state),

            // -------------------------------------------------------------------
            // Relay-Nachrichten
            // -------------------------------------------------------------------
            nachricht @ (SignalMessage::Offer(_)
            | SignalMessage::Answer(_)
            | SignalMessage::Candidate(_)
            | SignalMessage::MuteStatus(_)
            | SignalMessage::AudioData(_)) => {
                relay_handler::handle_relay(nachricht, verbindungs_id, &self.state)
            }

            // Authenticate wird bereits in dispatch behandelt
            SignalMessage::Authenticate(_) => DispatchErgebnis::eine(SignalMessage::fehler(
                ErrorCode::MalformedFrame,
                "Bereits authentifiziert",
            )),

            // -------------------------------------------------------------------
            // Server->Client Nachrichten vom Client sind Protokollfehler
            // -------------------------------------------------------------------
            SignalMessage::Authenticated(_)
            | SignalMessage::Error(_)
            | SignalMessage::PiList(_)
            | SignalMessage::QueueUpdate(_)
            | SignalMessage::PiAvailable(_)
            | SignalMessage::PiDisconnected(_)
            | SignalMessage::CallQueued(_)
            | SignalMessage::CallAccepted(_)
            | SignalMessage::PeerDisconnected(_) => {
                tracing::warn!(
                    verbindung = %verbindungs_id,
                    typ = nachricht.typ_name(),
                    "Unerwartete Server->Client Nachricht vom Client empfangen"
                );
                DispatchErgebnis::eine(SignalMessage::fehler(
                    ErrorCode::MalformedFrame,
                    "Unerwartete Nachricht",
                ))
            }
        }
    }

    /// Bereinigt alle Ressourcen einer Verbindung beim Trennen
    ///
    /// Loest eine bestehende Kopplung, entfernt den Warteschlangen-Eintrag
    /// und informiert Partner und Operatoren. Fuer nie authentifizierte
    /// Verbindungen gibt es nichts abzuraeumen.
    pub fn verbindung_bereinigen(&self, ctx: &DispatcherContext) {
        let Some(sitzung) = &ctx.sitzung else {
            return;
        };

        self.state.broadcaster.entfernen(&ctx.verbindungs_id);
        let ergebnis = self.state.vermittlung.verbindung_schliessen(&ctx.verbindungs_id);

        if let Some(peer) = ergebnis.ehemaliger_peer {
            self.state.broadcaster.an_verbindung_senden(
                &peer,
                SignalMessage::peer_disconnected(ctx.verbindungs_id).into(),
            );
        }

        if sitzung.rolle == Rolle::Caller {
            self.state
                .broadcaster
                .an_operatoren_senden(&SignalMessage::pi_disconnected(ctx.verbindungs_id));
        }

        if ergebnis.queue_geaendert {
            self.state
                .broadcaster
                .an_operatoren_senden(&SignalMessage::queue_update(ergebnis.schnappschuss));
        }

        tracing::debug!(
            verbindung = %ctx.verbindungs_id,
            rolle = %sitzung.rolle,
            "Verbindungs-Ressourcen bereinigt"
        );
    }
}
