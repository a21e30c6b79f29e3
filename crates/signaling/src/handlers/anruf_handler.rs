//! Anruf-Handler – Warteschlange und Gespraechs-Kopplung
//!
//! Verarbeitet RequestCall, TakeCall und EndCall. Alle Zustandsaenderungen
//! laufen ueber die Vermittlung; dieser Handler uebersetzt deren Ergebnisse
//! in Antwort-Frames und Operator-Broadcasts.

use crate::dispatcher::DispatchErgebnis;
use crate::server_state::VermittlungsState;
use leitstelle_core::types::{Rolle, VerbindungsId};
use leitstelle_protocol::signal::{ErrorCode, SignalMessage, TakeCallFrame};
use std::sync::Arc;

/// Verarbeitet ein RequestCall-Frame eines Anrufers
///
/// Reiht den Anrufer in die Warteschlange ein und meldet ihm seine
/// Position. Ein wiederholtes RequestCall aendert die Position nicht
/// und loest keinen weiteren Broadcast aus.
pub fn handle_request_call(
    verbindungs_id: VerbindungsId,
    rolle: Rolle,
    state: &Arc<VermittlungsState>,
) -> DispatchErgebnis {
    if rolle != Rolle::Caller {
        return DispatchErgebnis::eine(SignalMessage::fehler(
            ErrorCode::MalformedFrame,
            "Nur Anrufer koennen Gespraeche anfragen",
        ));
    }

    let Some(ergebnis) = state.vermittlung.anruf_einreihen(&verbindungs_id) else {
        tracing::warn!(verbindung = %verbindungs_id, "RequestCall ohne registrierte Verbindung");
        return DispatchErgebnis::keine();
    };

    if !ergebnis.bereits_eingereiht {
        state
            .broadcaster
            .an_operatoren_senden(&SignalMessage::queue_update(ergebnis.schnappschuss));
        tracing::info!(
            verbindung = %verbindungs_id,
            position = ergebnis.position,
            "Anrufer in Warteschlange eingereiht"
        );
    }

    DispatchErgebnis::eine(SignalMessage::call_queued(ergebnis.position))
}

/// Verarbeitet ein TakeCall-Frame eines Operators
///
/// Der Eintrag wird atomar aus der Warteschlange entnommen; nur der erste
/// Operator gewinnt. Ein bereits entnommener Eintrag ist ein stilles
/// No-op, der zweite Operator sieht die Entnahme ueber das QueueUpdate.
pub fn handle_take_call(
    frame: TakeCallFrame,
    verbindungs_id: VerbindungsId,
    rolle: Rolle,
    state: &Arc<VermittlungsState>,
) -> DispatchErgebnis {
    if rolle != Rolle::Operator {
        return DispatchErgebnis::eine(SignalMessage::fehler(
            ErrorCode::MalformedFrame,
            "Nur Operatoren koennen Gespraeche annehmen",
        ));
    }

    let ergebnis = state
        .vermittlung
        .anruf_annehmen(&verbindungs_id, &frame.caller_id);

    if !ergebnis.entnommen {
        tracing::debug!(
            operator = %verbindungs_id,
            anrufer = %frame.caller_id,
            "TakeCall fuer bereits entnommenen Eintrag"
        );
        return DispatchErgebnis::keine();
    }

    if ergebnis.gekoppelt {
        state.broadcaster.an_verbindung_senden(
            &frame.caller_id,
            SignalMessage::call_accepted(verbindungs_id).into(),
        );
        tracing::info!(
            operator = %verbindungs_id,
            anrufer = %frame.caller_id,
            "Gespraech angenommen"
        );
    }

    state
        .broadcaster
        .an_operatoren_senden(&SignalMessage::queue_update(ergebnis.schnappschuss));
    DispatchErgebnis::keine()
}

/// Verarbeitet ein EndCall-Frame
///
/// Loest die Kopplung beider Seiten und benachrichtigt den verbliebenen
/// Partner. Die Verbindung selbst bleibt bestehen, beide Seiten sind
/// danach wieder frei.
pub fn handle_end_call(
    verbindungs_id: VerbindungsId,
    state: &Arc<VermittlungsState>,
) -> DispatchErgebnis {
    if let Some(peer) = state.vermittlung.gespraech_beenden(&verbindungs_id) {
        state.broadcaster.an_verbindung_senden(
            &peer,
            SignalMessage::peer_disconnected(verbindungs_id).into(),
        );
        tracing::info!(
            verbindung = %verbindungs_id,
            partner = %peer,
            "Gespraech beendet"
        );
    }
    DispatchErgebnis::keine()
}
