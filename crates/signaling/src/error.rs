//! Fehlertypen fuer den Vermittlungs-Service

use leitstelle_auth::AuthError;
use thiserror::Error;

/// Fehlertyp fuer den Vermittlungs-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Authentifizierungsfehler
    #[error("Authentifizierungsfehler: {0}")]
    Auth(#[from] AuthError),

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Protokollfehler (ungueltiges Frame, falscher Zustand)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Verbindung haengt bereits in einem Gespraech
    #[error("Verbindung ist bereits gekoppelt")]
    BereitsGekoppelt,

    /// Verbindung nicht im Register
    #[error("Verbindung nicht gefunden")]
    NichtGefunden,

    /// Server ist voll
    #[error("Server ist voll")]
    ServerVoll,

    /// Senden an Client fehlgeschlagen (Queue voll oder geschlossen)
    #[error("Senden fehlgeschlagen")]
    SendFehler,

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }
}

/// Result-Typ fuer den Vermittlungs-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
