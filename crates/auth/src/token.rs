//! Signierte Sitzungs- und Challenge-Tokens
//!
//! Beide Token-Arten sind HS256-JWTs mit eingebettetem Ablauf. Es gibt
//! keine Sperrliste: ein Token ist genau so lange gueltig wie sein `exp`,
//! die Pruefung ist rein rechnerisch und beruehrt weder Verzeichnis noch
//! Netzwerk.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use leitstelle_core::Rolle;

use crate::error::{AuthError, AuthResult};

/// Lebensdauer von Anrufer-Sitzungen: 24 Stunden
pub const CALLER_TTL_SEKUNDEN: i64 = 24 * 60 * 60;

/// Lebensdauer von Operator-Sitzungen: 8 Stunden
pub const OPERATOR_TTL_SEKUNDEN: i64 = 8 * 60 * 60;

/// Lebensdauer von Challenge-Tokens: 5 Minuten
pub const CHALLENGE_TTL_SEKUNDEN: i64 = 5 * 60;

/// Claims eines Sitzungs-Tokens (Anrufer oder Operator)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitzungsClaims {
    /// Identitaets-Fingerprint des Geraets bzw. Benutzername des Operators
    pub sub: String,
    /// Rolle als Claim-String ("caller" oder "operator")
    pub role: String,
    /// Ausgestellt am (Unix-Sekunden)
    pub iat: i64,
    /// Laeuft ab am (Unix-Sekunden)
    pub exp: i64,
}

/// Claims eines Challenge-Tokens
///
/// Bindet den Challenge-Text an den Schluessel, der ihn angefordert hat.
/// Der Einmal-Verbrauch laeuft separat ueber den Challenge-Store; das
/// Token selbst bleibt zustandslos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeClaims {
    /// Oeffentlicher Schluessel des Geraets (Base64)
    pub sub: String,
    /// Der Text den das Geraet signieren soll
    pub challenge: String,
    pub iat: i64,
    pub exp: i64,
}

/// Identitaet aus einem gueltigen Sitzungs-Token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitzungsIdentitaet {
    pub fingerprint: String,
    pub rolle: Rolle,
}

/// Ein frisch ausgestelltes Sitzungs-Token samt Ablaufzeit
#[derive(Debug, Clone)]
pub struct AusgestelltesToken {
    pub token: String,
    /// Ablauf als Unix-Sekunden
    pub laeuft_ab_am: i64,
}

/// Stellt Tokens aus und prueft sie
pub struct TokenDienst {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    caller_ttl: i64,
    operator_ttl: i64,
    challenge_ttl: i64,
}

impl TokenDienst {
    /// Erstellt den Dienst mit festem Geheimnis und Standard-Lebensdauern
    pub fn neu(geheimnis: &[u8]) -> Self {
        Self::mit_ttls(
            geheimnis,
            CALLER_TTL_SEKUNDEN,
            OPERATOR_TTL_SEKUNDEN,
            CHALLENGE_TTL_SEKUNDEN,
        )
    }

    /// Erstellt den Dienst mit abweichenden Lebensdauern (Sekunden)
    pub fn mit_ttls(geheimnis: &[u8], caller_ttl: i64, operator_ttl: i64, challenge_ttl: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Ablauf ohne Kulanzfenster
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(geheimnis),
            decoding: DecodingKey::from_secret(geheimnis),
            validation,
            caller_ttl,
            operator_ttl,
            challenge_ttl,
        }
    }

    /// Erstellt den Dienst mit einem zufaelligen Geheimnis
    ///
    /// Ausgestellte Sitzungen ueberleben damit keinen Neustart.
    pub fn mit_zufallsgeheimnis() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::neu(&bytes)
    }

    /// Stellt ein Sitzungs-Token fuer die angegebene Rolle aus
    pub fn sitzung_ausstellen(
        &self,
        fingerprint: &str,
        rolle: Rolle,
    ) -> AuthResult<AusgestelltesToken> {
        let ttl = match rolle {
            Rolle::Caller => self.caller_ttl,
            Rolle::Operator => self.operator_ttl,
        };
        let jetzt = Utc::now().timestamp();
        let claims = SitzungsClaims {
            sub: fingerprint.to_string(),
            role: rolle.als_str().to_string(),
            iat: jetzt,
            exp: jetzt + ttl,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::intern(format!("Token-Signierung fehlgeschlagen: {e}")))?;

        Ok(AusgestelltesToken {
            token,
            laeuft_ab_am: claims.exp,
        })
    }

    /// Prueft ein Sitzungs-Token und liefert Fingerprint und Rolle
    ///
    /// Abgelaufene, manipulierte und fremd signierte Tokens fallen alle
    /// in denselben Fehler; ein Angreifer lernt nichts ueber den Grund.
    pub fn sitzung_pruefen(&self, token: &str) -> AuthResult<SitzungsIdentitaet> {
        let daten = decode::<SitzungsClaims>(token, &self.decoding, &self.validation)
            .map_err(|_| AuthError::TokenUngueltigOderAbgelaufen)?;

        let rolle = Rolle::aus_str(&daten.claims.role)
            .ok_or(AuthError::TokenUngueltigOderAbgelaufen)?;

        Ok(SitzungsIdentitaet {
            fingerprint: daten.claims.sub,
            rolle,
        })
    }

    /// Stellt ein Challenge-Token aus
    pub fn challenge_ausstellen(&self, public_key: &str, challenge_text: &str) -> AuthResult<String> {
        let jetzt = Utc::now().timestamp();
        let claims = ChallengeClaims {
            sub: public_key.to_string(),
            challenge: challenge_text.to_string(),
            iat: jetzt,
            exp: jetzt + self.challenge_ttl,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::intern(format!("Token-Signierung fehlgeschlagen: {e}")))
    }

    /// Prueft ein Challenge-Token und liefert die eingebetteten Claims
    pub fn challenge_pruefen(&self, token: &str) -> AuthResult<ChallengeClaims> {
        let daten = decode::<ChallengeClaims>(token, &self.decoding, &self.validation)
            .map_err(|_| AuthError::TokenUngueltigOderAbgelaufen)?;
        Ok(daten.claims)
    }
}

impl std::fmt::Debug for TokenDienst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenDienst")
            .field("caller_ttl", &self.caller_ttl)
            .field("operator_ttl", &self.operator_ttl)
            .field("challenge_ttl", &self.challenge_ttl)
            .finish_non_exhaustive()
    }
}
