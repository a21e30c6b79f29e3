//! Geraete-Nachweis via Ed25519
//!
//! Geraete weisen ihre Identitaet nach, indem sie den Challenge-Text mit
//! ihrem privaten Schluessel signieren. Der Server kennt nur den
//! oeffentlichen Schluessel (32 Bytes, Base64). Aus ihm leitet sich der
//! Fingerprint ab, der als kanonische Identitaet in Tokens und Registry
//! auftaucht.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::{AuthError, AuthResult};

/// Berechnet den Identitaets-Fingerprint eines Geraeteschluessels
///
/// Der Fingerprint ist das URL-sichere Base64 (ohne Padding) von
/// SHA-256 ueber die rohen Schluessel-Bytes. Schluessel die sich nicht
/// als Ed25519-Punkt lesen lassen werden abgelehnt.
pub fn fingerprint_berechnen(public_key_b64: &str) -> AuthResult<String> {
    let key = schluessel_dekodieren(public_key_b64)?;
    let digest = Sha256::digest(key.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(digest))
}

/// Verifiziert die Signatur eines Geraets ueber den Challenge-Text
///
/// Kaputte Schluessel oder Signaturen zaehlen als fehlgeschlagener
/// Nachweis, nicht als interner Fehler.
pub fn nachweis_pruefen(public_key_b64: &str, challenge_text: &str, signatur_b64: &str) -> bool {
    let Ok(key) = schluessel_dekodieren(public_key_b64) else {
        return false;
    };
    let Ok(sig_bytes) = STANDARD.decode(signatur_b64) else {
        return false;
    };
    let Ok(sig_array) = <&[u8; 64]>::try_from(sig_bytes.as_slice()) else {
        return false;
    };
    let signature = Signature::from_bytes(sig_array);
    key.verify(challenge_text.as_bytes(), &signature).is_ok()
}

/// Dekodiert einen Base64-Schluessel und validiert ihn als Ed25519-Punkt
fn schluessel_dekodieren(public_key_b64: &str) -> AuthResult<VerifyingKey> {
    let bytes = STANDARD
        .decode(public_key_b64)
        .map_err(|_| AuthError::UnbekannteIdentitaet(public_key_b64.to_string()))?;
    let array: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| AuthError::UnbekannteIdentitaet(public_key_b64.to_string()))?;
    VerifyingKey::from_bytes(&array)
        .map_err(|_| AuthError::UnbekannteIdentitaet(public_key_b64.to_string()))
}
