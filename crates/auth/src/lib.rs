//! leitstelle-auth: Identitaetspruefung fuer Geraete und Operatoren
//!
//! Dieses Crate implementiert:
//! - Challenge-Ausstellung und -Verbrauch (in-memory mit TTL)
//! - Ed25519-Nachweispruefung und Schluessel-Fingerprints
//! - Passwort-Hashing mit Argon2id fuer Operator-Konten
//! - Signierte Sitzungs-Tokens (HS256, eingebetteter Ablauf)
//! - CredentialVerifier (Challenge, Challenge-Antwort, Login, Token-Pruefung)
//! - Verzeichnis-Traits samt In-Memory-Implementierung

pub mod challenge;
pub mod error;
pub mod nachweis;
pub mod passwort;
pub mod token;
pub mod verifier;
pub mod verzeichnis;

// Bequeme Re-Exporte
pub use challenge::{Challenge, ChallengeStore};
pub use error::{AuthError, AuthResult};
pub use nachweis::{fingerprint_berechnen, nachweis_pruefen};
pub use passwort::{passwort_hashen, passwort_verifizieren};
pub use token::{AusgestelltesToken, SitzungsIdentitaet, TokenDienst};
pub use verifier::{AusgestellteChallenge, CredentialVerifier};
pub use verzeichnis::{
    GeraetEintrag, GeraeteVerzeichnis, OperatorEintrag, OperatorVerzeichnis, SpeicherVerzeichnis,
};
