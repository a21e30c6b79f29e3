//! Fehlertypen fuer die Identitaetspruefung

use leitstelle_protocol::signal::ErrorCode;
use thiserror::Error;

/// Alle moeglichen Fehler bei der Identitaetspruefung
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Geraete-Identitaet ---
    #[error("Unbekannte Identitaet: {0}")]
    UnbekannteIdentitaet(String),

    #[error("Keine passende Challenge offen")]
    ChallengeNichtGefunden,

    #[error("Signatur-Nachweis ungueltig")]
    NachweisUngueltig,

    // --- Tokens ---
    #[error("Token ungueltig oder abgelaufen")]
    TokenUngueltigOderAbgelaufen,

    // --- Operator-Login ---
    #[error("Benutzername oder Passwort falsch")]
    UngueltigeAnmeldedaten,

    // --- Passwort ---
    #[error("Passwort-Hashing fehlgeschlagen: {0}")]
    PasswortHashing(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Stabiler Wire-Code fuer Fehler-Frames und REST-Antworten
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            Self::UnbekannteIdentitaet(_) => ErrorCode::UnknownIdentity,
            Self::ChallengeNichtGefunden => ErrorCode::ChallengeMismatch,
            Self::NachweisUngueltig => ErrorCode::ProofInvalid,
            Self::TokenUngueltigOderAbgelaufen => ErrorCode::TokenInvalidOrExpired,
            Self::UngueltigeAnmeldedaten => ErrorCode::InvalidCredentials,
            Self::PasswortHashing(_) | Self::Intern(_) => ErrorCode::InternalError,
        }
    }

    /// HTTP-Status fuer die REST-Endpunkte
    pub fn http_status(&self) -> u16 {
        match self {
            Self::UnbekannteIdentitaet(_) => 404,
            Self::ChallengeNichtGefunden
            | Self::NachweisUngueltig
            | Self::TokenUngueltigOderAbgelaufen
            | Self::UngueltigeAnmeldedaten => 401,
            Self::PasswortHashing(_) | Self::Intern(_) => 500,
        }
    }
}

/// Result-Alias fuer die Identitaetspruefung
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_decken_taxonomie_ab() {
        assert_eq!(
            AuthError::UnbekannteIdentitaet("pk".into()).wire_code(),
            ErrorCode::UnknownIdentity
        );
        assert_eq!(
            AuthError::ChallengeNichtGefunden.wire_code(),
            ErrorCode::ChallengeMismatch
        );
        assert_eq!(
            AuthError::NachweisUngueltig.wire_code(),
            ErrorCode::ProofInvalid
        );
        assert_eq!(
            AuthError::TokenUngueltigOderAbgelaufen.wire_code(),
            ErrorCode::TokenInvalidOrExpired
        );
    }

    #[test]
    fn http_status_zuordnung() {
        assert_eq!(AuthError::UnbekannteIdentitaet("pk".into()).http_status(), 404);
        assert_eq!(AuthError::UngueltigeAnmeldedaten.http_status(), 401);
        assert_eq!(AuthError::intern("kaputt").http_status(), 500);
    }
}
