//! Integration-Tests fuer den Vermittlungs-Ablauf
//!
//! Testet das Zusammenspiel von Dispatcher, Vermittlung und Broadcaster
//! ohne echten TCP-Socket: jeder Dispatcher-Kontext simuliert eine
//! Verbindung, die Send-Queues stehen fuer die Sockets.

use leitstelle_auth::token::TokenDienst;
use leitstelle_core::types::{Rolle, VerbindungsId};
use leitstelle_protocol::signal::{
    AuthenticateFrame, ErrorCode, OfferFrame, SignalMessage, TakeCallFrame,
};
use leitstelle_protocol::wire::SendeFrame;
use leitstelle_signaling::{
    DispatcherContext, MessageDispatcher, VermittlungsConfig, VermittlungsState,
};
use std::sync::Arc;
use tokio::sync::mpsc;

const TEST_GEHEIMNIS: &[u8] = b"integrations-test-geheimnis";

fn aufbau() -> (Arc<VermittlungsState>, MessageDispatcher, Arc<TokenDienst>) {
    let token_dienst = Arc::new(TokenDienst::neu(TEST_GEHEIMNIS));
    let state = VermittlungsState::neu(VermittlungsConfig::default(), Arc::clone(&token_dienst));
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    (state, dispatcher, token_dienst)
}

fn neue_verbindung() -> (DispatcherContext, mpsc::Receiver<SendeFrame>) {
    let (tx, rx) = mpsc::channel(16);
    let ctx = DispatcherContext {
        verbindungs_id: VerbindungsId::new(),
        peer_addr: "127.0.0.1:9000".parse().expect("Testadresse"),
        sitzung: None,
        sende_tx: tx,
    };
    (ctx, rx)
}

fn anmelden(
    dispatcher: &MessageDispatcher,
    token_dienst: &TokenDienst,
    ctx: &mut DispatcherContext,
    fingerprint: &str,
    rolle: Rolle,
) -> Vec<SignalMessage> {
    let ausgestellt = token_dienst
        .sitzung_ausstellen(fingerprint, rolle)
        .expect("Token ausstellen");
    let ergebnis = dispatcher.dispatch(
        SignalMessage::Authenticate(AuthenticateFrame {
            token: ausgestellt.token,
        }),
        ctx,
    );
    assert!(!ergebnis.trennen, "Anmeldung darf die Verbindung nicht beenden");
    ergebnis.antworten
}

fn als_nachricht(frame: SendeFrame) -> SignalMessage {
    match frame {
        SendeFrame::Nachricht(nachricht) => nachricht,
        SendeFrame::Serialisiert(json) => {
            SignalMessage::from_json(&json).expect("Broadcast-Frame lesbar")
        }
    }
}

fn naechstes_frame(rx: &mut mpsc::Receiver<SendeFrame>) -> SignalMessage {
    als_nachricht(rx.try_recv().expect("Frame erwartet"))
}

fn alle_frames(rx: &mut mpsc::Receiver<SendeFrame>) -> Vec<SignalMessage> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(als_nachricht(frame));
    }
    frames
}

/// Baut ein gekoppeltes Paar aus Operator und Anrufer auf und leert
/// beide Empfangs-Queues.
#[allow(clippy::type_complexity)]
fn gekoppeltes_paar(
    dispatcher: &MessageDispatcher,
    token_dienst: &TokenDienst,
) -> (
    DispatcherContext,
    mpsc::Receiver<SendeFrame>,
    DispatcherContext,
    mpsc::Receiver<SendeFrame>,
) {
    let (mut op_ctx, mut op_rx) = neue_verbindung();
    anmelden(dispatcher, token_dienst, &mut op_ctx, "op-aa:bb", Rolle::Operator);
    let (mut caller_ctx, mut caller_rx) = neue_verbindung();
    anmelden(dispatcher, token_dienst, &mut caller_ctx, "pi-11:22", Rolle::Caller);

    dispatcher.dispatch(SignalMessage::RequestCall, &mut caller_ctx);
    dispatcher.dispatch(
        SignalMessage::TakeCall(TakeCallFrame {
            caller_id: caller_ctx.verbindungs_id,
        }),
        &mut op_ctx,
    );

    let _ = alle_frames(&mut op_rx);
    let _ = alle_frames(&mut caller_rx);
    (op_ctx, op_rx, caller_ctx, caller_rx)
}

// ---------------------------------------------------------------------------
// Authentifizierung
// ---------------------------------------------------------------------------

#[test]
fn erste_nachricht_muss_authenticate_sein() {
    let (_state, dispatcher, _token_dienst) = aufbau();
    let (mut ctx, _rx) = neue_verbindung();

    let ergebnis = dispatcher.dispatch(SignalMessage::RequestCall, &mut ctx);

    assert!(!ergebnis.trennen, "Verbindung bleibt offen");
    match ergebnis.antworten.as_slice() {
        [SignalMessage::Error(fehler)] => {
            assert_eq!(fehler.code, ErrorCode::NotAuthenticated);
        }
        andere => panic!("Erwartet Error-Frame, bekam {:?}", andere),
    }
}

#[test]
fn ungueltiges_token_beendet_die_verbindung() {
    let (_state, dispatcher, _token_dienst) = aufbau();
    let (mut ctx, _rx) = neue_verbindung();

    let ergebnis = dispatcher.dispatch(
        SignalMessage::Authenticate(AuthenticateFrame {
            token: "kein-gueltiges-jwt".to_string(),
        }),
        &mut ctx,
    );

    assert!(ergebnis.trennen, "Fehlgeschlagene Anmeldung beendet die Verbindung");
    match ergebnis.antworten.as_slice() {
        [SignalMessage::Error(fehler)] => {
            assert_eq!(fehler.code, ErrorCode::TokenInvalidOrExpired);
        }
        andere => panic!("Erwartet Error-Frame, bekam {:?}", andere),
    }
    assert!(ctx.sitzung.is_none());
}

#[test]
fn doppelte_authentifizierung_wird_abgelehnt() {
    let (_state, dispatcher, token_dienst) = aufbau();
    let (mut ctx, _rx) = neue_verbindung();
    anmelden(&dispatcher, &token_dienst, &mut ctx, "pi-11:22", Rolle::Caller);

    let zweites_token = token_dienst
        .sitzung_ausstellen("pi-11:22", Rolle::Caller)
        .expect("Token ausstellen");
    let ergebnis = dispatcher.dispatch(
        SignalMessage::Authenticate(AuthenticateFrame {
            token: zweites_token.token,
        }),
        &mut ctx,
    );

    assert!(!ergebnis.trennen);
    match ergebnis.antworten.as_slice() {
        [SignalMessage::Error(fehler)] => {
            assert_eq!(fehler.code, ErrorCode::MalformedFrame);
        }
        andere => panic!("Erwartet Error-Frame, bekam {:?}", andere),
    }
}

#[test]
fn caller_anmeldung_meldet_verfuegbarkeit() {
    let (_state, dispatcher, token_dienst) = aufbau();
    let (mut op_ctx, mut op_rx) = neue_verbindung();
    anmelden(&dispatcher, &token_dienst, &mut op_ctx, "op-aa:bb", Rolle::Operator);

    let (mut caller_ctx, _caller_rx) = neue_verbindung();
    let antworten = anmelden(
        &dispatcher,
        &token_dienst,
        &mut caller_ctx,
        "pi-11:22",
        Rolle::Caller,
    );

    match antworten.as_slice() {
        [SignalMessage::Authenticated(auth)] => {
            assert_eq!(auth.connection_id, caller_ctx.verbindungs_id);
        }
        andere => panic!("Erwartet Authenticated-Frame, bekam {:?}", andere),
    }

    match naechstes_frame(&mut op_rx) {
        SignalMessage::PiAvailable(frame) => {
            assert_eq!(frame.caller_id, caller_ctx.verbindungs_id);
            assert_eq!(frame.identity, "pi-11:22");
        }
        andere => panic!("Erwartet PiAvailable-Frame, bekam {:?}", andere),
    }
}

#[test]
fn operator_anmeldung_erhaelt_schnappschuss() {
    let (_state, dispatcher, token_dienst) = aufbau();

    let (mut caller_ctx, _caller_rx) = neue_verbindung();
    anmelden(
        &dispatcher,
        &token_dienst,
        &mut caller_ctx,
        "pi-11:22",
        Rolle::Caller,
    );
    dispatcher.dispatch(SignalMessage::RequestCall, &mut caller_ctx);

    let (mut op_ctx, _op_rx) = neue_verbindung();
    let antworten = anmelden(
        &dispatcher,
        &token_dienst,
        &mut op_ctx,
        "op-aa:bb",
        Rolle::Operator,
    );

    assert_eq!(antworten.len(), 3, "Authenticated, PiList und QueueUpdate");
    assert!(matches!(antworten[0], SignalMessage::Authenticated(_)));
    match &antworten[1] {
        SignalMessage::PiList(liste) => {
            assert_eq!(liste.callers.len(), 1);
            assert_eq!(liste.callers[0].caller_id, caller_ctx.verbindungs_id);
            assert_eq!(liste.callers[0].identity, "pi-11:22");
        }
        andere => panic!("Erwartet PiList-Frame, bekam {:?}", andere),
    }
    match &antworten[2] {
        SignalMessage::QueueUpdate(update) => {
            assert_eq!(update.queue.len(), 1);
            assert_eq!(update.queue[0].caller_id, caller_ctx.verbindungs_id);
        }
        andere => panic!("Erwartet QueueUpdate-Frame, bekam {:?}", andere),
    }
}

// ---------------------------------------------------------------------------
// Anruf-Ablauf
// ---------------------------------------------------------------------------

#[test]
fn anruf_ablauf_von_anfrage_bis_annahme() {
    let (_state, dispatcher, token_dienst) = aufbau();
    let (mut op_ctx, mut op_rx) = neue_verbindung();
    anmelden(&dispatcher, &token_dienst, &mut op_ctx, "op-aa:bb", Rolle::Operator);
    let (mut caller_ctx, mut caller_rx) = neue_verbindung();
    anmelden(
        &dispatcher,
        &token_dienst,
        &mut caller_ctx,
        "pi-11:22",
        Rolle::Caller,
    );
    let _ = alle_frames(&mut op_rx);

    // Anruf anfragen
    let ergebnis = dispatcher.dispatch(SignalMessage::RequestCall, &mut caller_ctx);
    match ergebnis.antworten.as_slice() {
        [SignalMessage::CallQueued(frame)] => assert_eq!(frame.position, 1),
        andere => panic!("Erwartet CallQueued-Frame, bekam {:?}", andere),
    }
    match naechstes_frame(&mut op_rx) {
        SignalMessage::QueueUpdate(update) => assert_eq!(update.queue.len(), 1),
        andere => panic!("Erwartet QueueUpdate-Frame, bekam {:?}", andere),
    }

    // Operator nimmt an
    let ergebnis = dispatcher.dispatch(
        SignalMessage::TakeCall(TakeCallFrame {
            caller_id: caller_ctx.verbindungs_id,
        }),
        &mut op_ctx,
    );
    assert!(ergebnis.antworten.is_empty(), "TakeCall hat keine direkte Antwort");

    match naechstes_frame(&mut caller_rx) {
        SignalMessage::CallAccepted(frame) => {
            assert_eq!(frame.operator_id, op_ctx.verbindungs_id);
        }
        andere => panic!("Erwartet CallAccepted-Frame, bekam {:?}", andere),
    }
    match naechstes_frame(&mut op_rx) {
        SignalMessage::QueueUpdate(update) => assert!(update.queue.is_empty()),
        andere => panic!("Erwartet QueueUpdate-Frame, bekam {:?}", andere),
    }

    // Signalisierung laeuft jetzt ueber die Kopplung
    let offer = SignalMessage::Offer(OfferFrame {
        sdp: "v=0".to_string(),
        to: None,
        from: None,
    });
    dispatcher.dispatch(offer, &mut caller_ctx);
    match naechstes_frame(&mut op_rx) {
        SignalMessage::Offer(frame) => {
            assert_eq!(frame.from, Some(caller_ctx.verbindungs_id));
            assert_eq!(frame.sdp, "v=0");
        }
        andere => panic!("Erwartet Offer-Frame, bekam {:?}", andere),
    }

    // Gespraech beenden: Partner wird informiert, beide wieder frei
    dispatcher.dispatch(SignalMessage::EndCall, &mut op_ctx);
    match naechstes_frame(&mut caller_rx) {
        SignalMessage::PeerDisconnected(frame) => {
            assert_eq!(frame.peer_id, op_ctx.verbindungs_id);
        }
        andere => panic!("Erwartet PeerDisconnected-Frame, bekam {:?}", andere),
    }

    let ergebnis = dispatcher.dispatch(SignalMessage::RequestCall, &mut caller_ctx);
    match ergebnis.antworten.as_slice() {
        [SignalMessage::CallQueued(frame)] => assert_eq!(frame.position, 1),
        andere => panic!("Erwartet CallQueued-Frame, bekam {:?}", andere),
    }
}

#[test]
fn zwei_operatoren_nehmen_denselben_anruf() {
    let (state, dispatcher, token_dienst) = aufbau();
    let (mut op1_ctx, mut op1_rx) = neue_verbindung();
    anmelden(&dispatcher, &token_dienst, &mut op1_ctx, "op-01", Rolle::Operator);
    let (mut op2_ctx, mut op2_rx) = neue_verbindung();
    anmelden(&dispatcher, &token_dienst, &mut op2_ctx, "op-02", Rolle::Operator);
    let (mut caller_ctx, mut caller_rx) = neue_verbindung();
    anmelden(
        &dispatcher,
        &token_dienst,
        &mut caller_ctx,
        "pi-11:22",
        Rolle::Caller,
    );
    dispatcher.dispatch(SignalMessage::RequestCall, &mut caller_ctx);
    let _ = alle_frames(&mut op1_rx);
    let _ = alle_frames(&mut op2_rx);
    let _ = alle_frames(&mut caller_rx);

    let caller_id = caller_ctx.verbindungs_id;
    let erster = dispatcher.dispatch(
        SignalMessage::TakeCall(TakeCallFrame { caller_id }),
        &mut op1_ctx,
    );
    let zweiter = dispatcher.dispatch(
        SignalMessage::TakeCall(TakeCallFrame { caller_id }),
        &mut op2_ctx,
    );
    assert!(erster.antworten.is_empty());
    assert!(zweiter.antworten.is_empty(), "Der Verlierer bekommt keinen Fehler");

    // Nur der erste Operator wurde gekoppelt
    match naechstes_frame(&mut caller_rx) {
        SignalMessage::CallAccepted(frame) => {
            assert_eq!(frame.operator_id, op1_ctx.verbindungs_id);
        }
        andere => panic!("Erwartet CallAccepted-Frame, bekam {:?}", andere),
    }
    assert!(caller_rx.try_recv().is_err(), "Kein zweites CallAccepted");

    let verbindung = state
        .vermittlung
        .verbindung_finden(&caller_id)
        .expect("Anrufer bleibt registriert");
    assert_eq!(verbindung.peer, Some(op1_ctx.verbindungs_id));

    // Der Verlierer sieht die Entnahme nur ueber das QueueUpdate des Gewinners
    let frames = alle_frames(&mut op2_rx);
    assert_eq!(frames.len(), 1);
    match &frames[0] {
        SignalMessage::QueueUpdate(update) => assert!(update.queue.is_empty()),
        andere => panic!("Erwartet QueueUpdate-Frame, bekam {:?}", andere),
    }
}

#[test]
fn wiederholtes_request_call_behaelt_die_position() {
    let (_state, dispatcher, token_dienst) = aufbau();
    let (mut op_ctx, mut op_rx) = neue_verbindung();
    anmelden(&dispatcher, &token_dienst, &mut op_ctx, "op-aa:bb", Rolle::Operator);
    let (mut caller_ctx, _caller_rx) = neue_verbindung();
    anmelden(
        &dispatcher,
        &token_dienst,
        &mut caller_ctx,
        "pi-11:22",
        Rolle::Caller,
    );
    let _ = alle_frames(&mut op_rx);

    dispatcher.dispatch(SignalMessage::RequestCall, &mut caller_ctx);
    let _ = alle_frames(&mut op_rx);

    let ergebnis = dispatcher.dispatch(SignalMessage::RequestCall, &mut caller_ctx);
    match ergebnis.antworten.as_slice() {
        [SignalMessage::CallQueued(frame)] => assert_eq!(frame.position, 1),
        andere => panic!("Erwartet CallQueued-Frame, bekam {:?}", andere),
    }
    assert!(
        op_rx.try_recv().is_err(),
        "Wiederholte Anfrage loest keinen weiteren Broadcast aus"
    );
}

#[test]
fn end_call_benachrichtigt_den_partner_genau_einmal() {
    let (state, dispatcher, token_dienst) = aufbau();
    let (op_ctx, mut op_rx, mut caller_ctx, _caller_rx) =
        gekoppeltes_paar(&dispatcher, &token_dienst);

    dispatcher.dispatch(SignalMessage::EndCall, &mut caller_ctx);
    let frames = alle_frames(&mut op_rx);
    assert_eq!(frames.len(), 1);
    match &frames[0] {
        SignalMessage::PeerDisconnected(frame) => {
            assert_eq!(frame.peer_id, caller_ctx.verbindungs_id);
        }
        andere => panic!("Erwartet PeerDisconnected-Frame, bekam {:?}", andere),
    }

    dispatcher.dispatch(SignalMessage::EndCall, &mut caller_ctx);
    assert!(
        alle_frames(&mut op_rx).is_empty(),
        "Zweites EndCall ist ein stilles No-op"
    );

    // Beide Verbindungen bestehen weiter
    assert!(state
        .vermittlung
        .verbindung_finden(&caller_ctx.verbindungs_id)
        .is_some());
    assert!(state
        .vermittlung
        .verbindung_finden(&op_ctx.verbindungs_id)
        .is_some());
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

#[test]
fn relay_bevorzugt_partner_vor_explizitem_ziel() {
    let (_state, dispatcher, token_dienst) = aufbau();
    let (_op_ctx, mut op_rx, mut caller_ctx, _caller_rx) =
        gekoppeltes_paar(&dispatcher, &token_dienst);

    let fremde_id = VerbindungsId::new();
    dispatcher.dispatch(
        SignalMessage::Offer(OfferFrame {
            sdp: "v=0".to_string(),
            to: Some(fremde_id),
            from: None,
        }),
        &mut caller_ctx,
    );

    match naechstes_frame(&mut op_rx) {
        SignalMessage::Offer(frame) => {
            assert_eq!(frame.from, Some(caller_ctx.verbindungs_id));
            assert_eq!(frame.to, None, "to wird beim Weiterleiten entfernt");
        }
        andere => panic!("Erwartet Offer-Frame, bekam {:?}", andere),
    }
}

#[test]
fn relay_ohne_ziel_wird_verworfen() {
    let (_state, dispatcher, token_dienst) = aufbau();
    let (mut caller_ctx, _caller_rx) = neue_verbindung();
    anmelden(
        &dispatcher,
        &token_dienst,
        &mut caller_ctx,
        "pi-11:22",
        Rolle::Caller,
    );

    // Ohne Partner und ohne to-Feld
    let ergebnis = dispatcher.dispatch(
        SignalMessage::Offer(OfferFrame {
            sdp: "v=0".to_string(),
            to: None,
            from: None,
        }),
        &mut caller_ctx,
    );
    assert!(ergebnis.antworten.is_empty(), "Verworfene Relays bleiben unbeantwortet");
    assert!(!ergebnis.trennen);

    // Explizites Ziel das niemand kennt
    let ergebnis = dispatcher.dispatch(
        SignalMessage::Offer(OfferFrame {
            sdp: "v=0".to_string(),
            to: Some(VerbindungsId::new()),
            from: None,
        }),
        &mut caller_ctx,
    );
    assert!(ergebnis.antworten.is_empty());
    assert!(!ergebnis.trennen);
}

// ---------------------------------------------------------------------------
// Verbindungsabbau
// ---------------------------------------------------------------------------

#[test]
fn getrennter_anrufer_raeumt_kopplung_ab() {
    let (state, dispatcher, token_dienst) = aufbau();
    let (op_ctx, mut op_rx, caller_ctx, _caller_rx) =
        gekoppeltes_paar(&dispatcher, &token_dienst);

    // Socket-Schluss des Anrufers
    dispatcher.verbindung_bereinigen(&caller_ctx);

    let frames = alle_frames(&mut op_rx);
    let getrennt_meldungen = frames
        .iter()
        .filter(|f| matches!(f, SignalMessage::PeerDisconnected(_)))
        .count();
    assert_eq!(getrennt_meldungen, 1, "Partner wird genau einmal informiert");
    assert!(
        frames.iter().any(
            |f| matches!(f, SignalMessage::PiDisconnected(p) if p.caller_id == caller_ctx.verbindungs_id)
        ),
        "Operatoren erfahren vom Abgang des Anrufers"
    );
    assert!(
        !frames.iter().any(|f| matches!(f, SignalMessage::QueueUpdate(_))),
        "Gekoppelte Anrufer stehen nicht in der Warteschlange"
    );

    assert!(state
        .vermittlung
        .verbindung_finden(&caller_ctx.verbindungs_id)
        .is_none());
    assert!(!state.broadcaster.ist_registriert(&caller_ctx.verbindungs_id));

    let operator = state
        .vermittlung
        .verbindung_finden(&op_ctx.verbindungs_id)
        .expect("Operator bleibt registriert");
    assert!(operator.peer.is_none(), "Operator ist wieder frei");
}

#[test]
fn getrennter_wartender_anrufer_verlaesst_die_warteschlange() {
    let (state, dispatcher, token_dienst) = aufbau();
    let (mut op_ctx, mut op_rx) = neue_verbindung();
    anmelden(&dispatcher, &token_dienst, &mut op_ctx, "op-aa:bb", Rolle::Operator);
    let (mut caller_ctx, _caller_rx) = neue_verbindung();
    anmelden(
        &dispatcher,
        &token_dienst,
        &mut caller_ctx,
        "pi-11:22",
        Rolle::Caller,
    );
    dispatcher.dispatch(SignalMessage::RequestCall, &mut caller_ctx);
    let _ = alle_frames(&mut op_rx);

    dispatcher.verbindung_bereinigen(&caller_ctx);

    let frames = alle_frames(&mut op_rx);
    assert!(
        frames.iter().any(
            |f| matches!(f, SignalMessage::QueueUpdate(u) if u.queue.is_empty())
        ),
        "Operatoren sehen die geleerte Warteschlange"
    );
    assert!(frames
        .iter()
        .any(|f| matches!(f, SignalMessage::PiDisconnected(_))));
    assert_eq!(state.vermittlung.warteschlangen_laenge(), 0);
}

// ---------------------------------------------------------------------------
// Rollen-Pruefung
// ---------------------------------------------------------------------------

#[test]
fn rollenfremde_anfragen_werden_abgelehnt() {
    let (_state, dispatcher, token_dienst) = aufbau();
    let (mut op_ctx, _op_rx) = neue_verbindung();
    anmelden(&dispatcher, &token_dienst, &mut op_ctx, "op-aa:bb", Rolle::Operator);
    let (mut caller_ctx, _caller_rx) = neue_verbindung();
    anmelden(
        &dispatcher,
        &token_dienst,
        &mut caller_ctx,
        "pi-11:22",
        Rolle::Caller,
    );

    let ergebnis = dispatcher.dispatch(SignalMessage::RequestCall, &mut op_ctx);
    match ergebnis.antworten.as_slice() {
        [SignalMessage::Error(fehler)] => {
            assert_eq!(fehler.code, ErrorCode::MalformedFrame);
        }
        andere => panic!("Erwartet Error-Frame, bekam {:?}", andere),
    }

    let ergebnis = dispatcher.dispatch(
        SignalMessage::TakeCall(TakeCallFrame {
            caller_id: caller_ctx.verbindungs_id,
        }),
        &mut caller_ctx,
    );
    match ergebnis.antworten.as_slice() {
        [SignalMessage::Error(fehler)] => {
            assert_eq!(fehler.code, ErrorCode::MalformedFrame);
        }
        andere => panic!("Erwartet Error-Frame, bekam {:?}", andere),
    }
}
