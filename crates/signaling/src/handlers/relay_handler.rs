//! Relay-Handler – Durchreichen von Signalisierungs-Frames
//!
//! Offer, Answer, Candidate, MuteStatus und AudioData werden unveraendert
//! an die Gegenstelle weitergereicht; der Server haengt lediglich den
//! Absender als `from` an. Ein bestehender Gespraechspartner hat Vorrang
//! vor dem expliziten `to`-Feld. Frames ohne aufloesbares Ziel werden
//! verworfen, nie beantwortet.

use crate::dispatcher::DispatchErgebnis;
use crate::server_state::VermittlungsState;
use leitstelle_core::types::VerbindungsId;
use leitstelle_protocol::signal::SignalMessage;
use std::sync::Arc;

/// Reicht ein Relay-Frame an die Gegenstelle weiter
pub fn handle_relay(
    nachricht: SignalMessage,
    verbindungs_id: VerbindungsId,
    state: &Arc<VermittlungsState>,
) -> DispatchErgebnis {
    let explizit = nachricht.relay_ziel();
    let typ = nachricht.typ_name();

    match state.vermittlung.relay_ziel(&verbindungs_id, explizit) {
        Some(ziel) => {
            let weitergeleitet = nachricht.als_relay_von(verbindungs_id);
            if !state
                .broadcaster
                .an_verbindung_senden(&ziel, weitergeleitet.into())
            {
                tracing::debug!(
                    typ,
                    von = %verbindungs_id,
                    ziel = %ziel,
                    "Relay-Ziel nicht erreichbar – Frame verworfen"
                );
            }
        }
        None => {
            tracing::debug!(typ, von = %verbindungs_id, "Kein Relay-Ziel – Frame verworfen");
        }
    }

    DispatchErgebnis::keine()
}
