//! Auth-Handler – Token-Pruefung beim Verbindungsaufbau
//!
//! Verarbeitet das Authenticate-Frame, prueft das Sitzungs-Token aus dem
//! Auth-Gateway und meldet die Verbindung je nach Rolle bei der
//! Vermittlung an. Bei Erfolg wird die Sitzung im Dispatcher-Kontext
//! gespeichert.

use crate::dispatcher::{DispatchErgebnis, DispatcherContext};
use crate::server_state::VermittlungsState;
use leitstelle_core::types::Rolle;
use leitstelle_protocol::signal::{AuthenticateFrame, ErrorCode, SignalMessage};
use std::sync::Arc;

/// Verarbeitet ein Authenticate-Frame
///
/// Ein ungueltiges oder abgelaufenes Token beantwortet der Handler mit
/// einem Fehler-Frame und beendet die Verbindung. Nach erfolgreicher
/// Pruefung erhaelt ein Anrufer sein Authenticated-Frame, ein Operator
/// zusaetzlich den aktuellen Registry- und Warteschlangen-Stand.
pub fn handle_authenticate(
    frame: AuthenticateFrame,
    ctx: &mut DispatcherContext,
    state: &Arc<VermittlungsState>,
) -> DispatchErgebnis {
    let sitzung = match state.token_dienst.sitzung_pruefen(&frame.token) {
        Ok(sitzung) => sitzung,
        Err(e) => {
            tracing::warn!(
                verbindung = %ctx.verbindungs_id,
                fehler = %e,
                "Authentifizierung fehlgeschlagen"
            );
            return DispatchErgebnis::fatal(SignalMessage::fehler(
                ErrorCode::TokenInvalidOrExpired,
                "Token ungueltig oder abgelaufen",
            ));
        }
    };

    // Registrierung vor dem Schnappschuss: dazwischen ausgeloeste
    // Broadcasts duplizieren hoechstens, verlieren aber nichts.
    state
        .broadcaster
        .registrieren(ctx.verbindungs_id, sitzung.rolle, ctx.sende_tx.clone());

    let antworten = match sitzung.rolle {
        Rolle::Caller => {
            state
                .vermittlung
                .caller_anmelden(ctx.verbindungs_id, &sitzung.fingerprint);
            state.broadcaster.an_operatoren_senden(&SignalMessage::pi_available(
                ctx.verbindungs_id,
                &sitzung.fingerprint,
            ));
            vec![SignalMessage::authenticated(ctx.verbindungs_id)]
        }
        Rolle::Operator => {
            let sicht = state
                .vermittlung
                .operator_anmelden(ctx.verbindungs_id, &sitzung.fingerprint);
            vec![
                SignalMessage::authenticated(ctx.verbindungs_id),
                SignalMessage::pi_list(sicht.callers),
                SignalMessage::queue_update(sicht.queue),
            ]
        }
    };

    tracing::info!(
        verbindung = %ctx.verbindungs_id,
        rolle = %sitzung.rolle,
        fingerprint = %sitzung.fingerprint,
        "Verbindung authentifiziert"
    );
    ctx.sitzung = Some(sitzung);

    DispatchErgebnis {
        antworten,
        trennen: false,
    }
}
