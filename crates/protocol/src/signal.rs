//! Signal-Protokoll (TCP)
//!
//! Definiert alle Vermittlungsnachrichten die ueber die TCP-Verbindung
//! zwischen Geraeten, Operatoren und dem Server ausgetauscht werden.
//!
//! ## Design
//! - Fire-and-forget: Frames tragen keine Request-IDs, Antworten ergeben
//!   sich aus dem Nachrichtentyp
//! - JSON-Serialisierung via serde (TCP, nicht zeitkritisch)
//! - Ein geschlossenes Tagged Enum fuer beide Richtungen
//! - Feldnamen auf dem Draht in camelCase (Kompatibilitaet mit den
//!   bestehenden Clients)

use leitstelle_core::types::VerbindungsId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer Error-Frames und REST-Antworten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Identitaet / Tokens
    UnknownIdentity,
    ChallengeMismatch,
    ProofInvalid,
    TokenInvalidOrExpired,
    InvalidCredentials,
    // Vermittlung
    AlreadyPaired,
    MalformedFrame,
    NotAuthenticated,
    // Allgemein
    InternalError,
}

// ---------------------------------------------------------------------------
// Eingehende Frames (Geraet/Operator -> Server)
// ---------------------------------------------------------------------------

/// Erste Nachricht jeder Verbindung: Sitzungs-Token vorlegen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticateFrame {
    /// Signiertes Sitzungs-Token aus dem Identitaets-Endpunkt
    pub token: String,
}

/// Operator beansprucht einen wartenden Anrufer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeCallFrame {
    pub caller_id: VerbindungsId,
}

// ---------------------------------------------------------------------------
// Relay-Frames (beide Richtungen)
//
// Eingehend tragen sie optional `to` (nur relevant solange die Verbindung
// keinen Partner hat); beim Weiterleiten haengt der Server `from` an und
// entfernt `to`.
// ---------------------------------------------------------------------------

/// SDP-Offer fuer den Verbindungsaufbau
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferFrame {
    pub sdp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<VerbindungsId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<VerbindungsId>,
}

/// SDP-Answer des Gegenuebers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerFrame {
    pub sdp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<VerbindungsId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<VerbindungsId>,
}

/// ICE-Kandidat; der Inhalt wird unveraendert durchgereicht
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateFrame {
    pub candidate: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<VerbindungsId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<VerbindungsId>,
}

/// Stummschalt-Status des Senders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuteStatusFrame {
    pub muted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<VerbindungsId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<VerbindungsId>,
}

/// Audio-Nutzdaten fuer den Fallback-Pfad ohne Direktverbindung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDataFrame {
    /// Base64-kodierte Nutzdaten, werden nicht inspiziert
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<VerbindungsId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<VerbindungsId>,
}

// ---------------------------------------------------------------------------
// Ausgehende Frames (Server -> Geraet/Operator)
// ---------------------------------------------------------------------------

/// Bestaetigung der Authentifizierung mit der vergebenen Verbindungs-ID
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedFrame {
    pub connection_id: VerbindungsId,
}

/// Fehler-Frame; die Verbindung bleibt offen, sofern der Kontext nichts
/// anderes verlangt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub code: ErrorCode,
    pub message: String,
}

/// Eintrag in der Anrufer-Uebersicht
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerInfo {
    pub caller_id: VerbindungsId,
    /// Identitaets-Fingerprint des Geraets
    pub identity: String,
}

/// Vollstaendige Anrufer-Uebersicht fuer Operatoren
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiListFrame {
    pub callers: Vec<CallerInfo>,
}

/// Eintrag in der Warteschlangen-Uebersicht
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub caller_id: VerbindungsId,
    pub identity: String,
    /// Unix-Sekunden des Einreihens
    pub enqueued_at: i64,
}

/// Vollstaendige Warteschlange fuer Operatoren
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueUpdateFrame {
    pub queue: Vec<QueueEntry>,
}

/// Ein Anrufer hat sich verbunden
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PiAvailableFrame {
    pub caller_id: VerbindungsId,
    pub identity: String,
}

/// Ein Anrufer hat die Verbindung verloren
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PiDisconnectedFrame {
    pub caller_id: VerbindungsId,
}

/// Position des Anrufers in der Warteschlange (1 = vorderster Platz)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallQueuedFrame {
    pub position: u32,
}

/// Ein Operator hat den Anruf angenommen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAcceptedFrame {
    pub operator_id: VerbindungsId,
}

/// Der gekoppelte Partner ist weg; das Gespraech ist beendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerDisconnectedFrame {
    pub peer_id: VerbindungsId,
}

// ---------------------------------------------------------------------------
// Haupt-Enum: SignalMessage
// ---------------------------------------------------------------------------

/// Alle moeglichen Signal-Nachrichten (typsicher via Tagged Enum)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMessage {
    // Eingehend
    Authenticate(AuthenticateFrame),
    RequestCall,
    TakeCall(TakeCallFrame),
    EndCall,

    // Relay (beide Richtungen)
    Offer(OfferFrame),
    Answer(AnswerFrame),
    Candidate(CandidateFrame),
    MuteStatus(MuteStatusFrame),
    AudioData(AudioDataFrame),

    // Ausgehend
    Authenticated(AuthenticatedFrame),
    Error(ErrorFrame),
    PiList(PiListFrame),
    QueueUpdate(QueueUpdateFrame),
    PiAvailable(PiAvailableFrame),
    PiDisconnected(PiDisconnectedFrame),
    CallQueued(CallQueuedFrame),
    CallAccepted(CallAcceptedFrame),
    PeerDisconnected(PeerDisconnectedFrame),
}

impl SignalMessage {
    /// Erstellt ein Fehler-Frame
    pub fn fehler(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorFrame {
            code,
            message: message.into(),
        })
    }

    /// Erstellt die Authentifizierungs-Bestaetigung
    pub fn authenticated(connection_id: VerbindungsId) -> Self {
        Self::Authenticated(AuthenticatedFrame { connection_id })
    }

    /// Erstellt die Anrufer-Uebersicht
    pub fn pi_list(callers: Vec<CallerInfo>) -> Self {
        Self::PiList(PiListFrame { callers })
    }

    /// Erstellt die Warteschlangen-Uebersicht
    pub fn queue_update(queue: Vec<QueueEntry>) -> Self {
        Self::QueueUpdate(QueueUpdateFrame { queue })
    }

    /// Meldet einen neu verbundenen Anrufer
    pub fn pi_available(caller_id: VerbindungsId, identity: impl Into<String>) -> Self {
        Self::PiAvailable(PiAvailableFrame {
            caller_id,
            identity: identity.into(),
        })
    }

    /// Meldet einen getrennten Anrufer
    pub fn pi_disconnected(caller_id: VerbindungsId) -> Self {
        Self::PiDisconnected(PiDisconnectedFrame { caller_id })
    }

    /// Bestaetigt das Einreihen mit der aktuellen Position
    pub fn call_queued(position: u32) -> Self {
        Self::CallQueued(CallQueuedFrame { position })
    }

    /// Meldet dem Anrufer den uebernehmenden Operator
    pub fn call_accepted(operator_id: VerbindungsId) -> Self {
        Self::CallAccepted(CallAcceptedFrame { operator_id })
    }

    /// Meldet das Ende eines Gespraechs durch Partnerverlust
    pub fn peer_disconnected(peer_id: VerbindungsId) -> Self {
        Self::PeerDisconnected(PeerDisconnectedFrame { peer_id })
    }

    /// Stabiler Typname fuer Logausgaben
    pub fn typ_name(&self) -> &'static str {
        match self {
            Self::Authenticate(_) => "authenticate",
            Self::RequestCall => "request_call",
            Self::TakeCall(_) => "take_call",
            Self::EndCall => "end_call",
            Self::Offer(_) => "offer",
            Self::Answer(_) => "answer",
            Self::Candidate(_) => "candidate",
            Self::MuteStatus(_) => "mute_status",
            Self::AudioData(_) => "audio_data",
            Self::Authenticated(_) => "authenticated",
            Self::Error(_) => "error",
            Self::PiList(_) => "pi_list",
            Self::QueueUpdate(_) => "queue_update",
            Self::PiAvailable(_) => "pi_available",
            Self::PiDisconnected(_) => "pi_disconnected",
            Self::CallQueued(_) => "call_queued",
            Self::CallAccepted(_) => "call_accepted",
            Self::PeerDisconnected(_) => "peer_disconnected",
        }
    }

    /// True fuer die fuenf weiterleitbaren Frame-Typen
    pub fn ist_relay(&self) -> bool {
        matches!(
            self,
            Self::Offer(_)
                | Self::Answer(_)
                | Self::Candidate(_)
                | Self::MuteStatus(_)
                | Self::AudioData(_)
        )
    }

    /// Liest das `to`-Adressfeld eines eingehenden Relay-Frames
    pub fn relay_ziel(&self) -> Option<VerbindungsId> {
        match self {
            Self::Offer(f) => f.to,
            Self::Answer(f) => f.to,
            Self::Candidate(f) => f.to,
            Self::MuteStatus(f) => f.to,
            Self::AudioData(f) => f.to,
            _ => None,
        }
    }

    /// Bereitet ein Relay-Frame fuer die Zustellung vor: `from` wird auf
    /// den Absender gesetzt, `to` entfernt. Nicht-Relay-Frames bleiben
    /// unveraendert.
    pub fn als_relay_von(self, absender: VerbindungsId) -> Self {
        match self {
            Self::Offer(mut f) => {
                f.from = Some(absender);
                f.to = None;
                Self::Offer(f)
            }
            Self::Answer(mut f) => {
                f.from = Some(absender);
                f.to = None;
                Self::Answer(f)
            }
            Self::Candidate(mut f) => {
                f.from = Some(absender);
                f.to = None;
                Self::Candidate(f)
            }
            Self::MuteStatus(mut f) => {
                f.from = Some(absender);
                f.to = None;
                Self::MuteStatus(f)
            }
            Self::AudioData(mut f) => {
                f.from = Some(absender);
                f.to = None;
                Self::AudioData(f)
            }
            andere => andere,
        }
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
