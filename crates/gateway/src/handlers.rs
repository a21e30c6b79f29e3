//! REST-Handler fuer die Identitaets-Endpunkte
//!
//! Die Handler uebersetzen nur zwischen JSON-Koerpern und dem
//! [`CredentialVerifier`](leitstelle_auth::verifier::CredentialVerifier);
//! Protokollierung der Pruefungen uebernimmt der Verifier selbst.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use leitstelle_auth::error::AuthError;
use leitstelle_auth::verzeichnis::{GeraeteVerzeichnis, OperatorVerzeichnis};

use crate::GatewayState;

// ---------------------------------------------------------------------------
// Request-/Response-Koerper
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeAnfrage {
    pub public_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeAntwort {
    pub challenge_token: String,
    pub challenge_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthAnfrage {
    pub challenge_token: String,
    pub signed_challenge: String,
}

#[derive(Debug, Serialize)]
pub struct AuthAntwort {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginAnfrage {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAntwort {
    pub token: String,
    pub expires_at: i64,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// POST /api/challenge – Challenge fuer ein registriertes Geraet ausstellen
pub async fn post_challenge<V, O>(
    State(state): State<GatewayState<V, O>>,
    Json(anfrage): Json<ChallengeAnfrage>,
) -> Response
where
    V: GeraeteVerzeichnis,
    O: OperatorVerzeichnis,
{
    match state
        .verifier
        .challenge_ausstellen(&anfrage.public_key)
        .await
    {
        Ok(challenge) => (
            StatusCode::OK,
            Json(ChallengeAntwort {
                challenge_token: challenge.challenge_token,
                challenge_text: challenge.challenge_text,
            }),
        )
            .into_response(),
        Err(fehler) => fehler_antwort(&fehler),
    }
}

/// POST /api/auth – signierte Challenge einloesen, Caller-Token ausstellen
pub async fn post_auth<V, O>(
    State(state): State<GatewayState<V, O>>,
    Json(anfrage): Json<AuthAnfrage>,
) -> Response
where
    V: GeraeteVerzeichnis,
    O: OperatorVerzeichnis,
{
    match state
        .verifier
        .challenge_antwort_pruefen(&anfrage.challenge_token, &anfrage.signed_challenge)
        .await
    {
        Ok(token) => (StatusCode::OK, Json(AuthAntwort { token: token.token })).into_response(),
        Err(fehler) => fehler_antwort(&fehler),
    }
}

/// POST /api/login – Operator-Anmeldung mit Benutzername und Passwort
pub async fn post_login<V, O>(
    State(state): State<GatewayState<V, O>>,
    Json(anfrage): Json<LoginAnfrage>,
) -> Response
where
    V: GeraeteVerzeichnis,
    O: OperatorVerzeichnis,
{
    match state
        .verifier
        .passwort_pruefen(&anfrage.username, &anfrage.password)
        .await
    {
        Ok(token) => (
            StatusCode::OK,
            Json(LoginAntwort {
                token: token.token,
                expires_at: token.laeuft_ab_am,
            }),
        )
            .into_response(),
        Err(fehler) => fehler_antwort(&fehler),
    }
}

/// GET /health – Health-Check-Endpunkt
pub async fn get_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Einheitliche Fehlerantwort: HTTP-Status samt Wire-Fehlercode im Body
pub fn fehler_antwort(fehler: &AuthError) -> Response {
    let status =
        StatusCode::from_u16(fehler.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({
            "code": fehler.wire_code(),
            "message": fehler.to_string(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    use leitstelle_auth::challenge::ChallengeStore;
    use leitstelle_auth::passwort::passwort_hashen;
    use leitstelle_auth::token::TokenDienst;
    use leitstelle_auth::verifier::CredentialVerifier;
    use leitstelle_auth::verzeichnis::SpeicherVerzeichnis;

    type TestState = GatewayState<SpeicherVerzeichnis, SpeicherVerzeichnis>;

    async fn aufbau() -> (TestState, SigningKey, String) {
        let verzeichnis = Arc::new(SpeicherVerzeichnis::neu());
        let signing_key = SigningKey::generate(&mut OsRng);
        let public_key = STANDARD.encode(signing_key.verifying_key().to_bytes());
        verzeichnis
            .geraet_hinzufuegen(public_key.clone())
            .await
            .unwrap();

        let hash = passwort_hashen("zentrale-passwort").unwrap();
        verzeichnis.operator_hinzufuegen("zentrale", hash).await;

        let verifier = Arc::new(CredentialVerifier::neu(
            Arc::clone(&verzeichnis),
            verzeichnis,
            ChallengeStore::neu(),
            Arc::new(TokenDienst::neu(b"gateway-test-geheimnis")),
        ));

        (GatewayState::neu(verifier), signing_key, public_key)
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn challenge_und_auth_liefern_ein_token() {
        let (state, signing_key, public_key) = aufbau().await;

        let antwort = post_challenge(
            State(state.clone()),
            Json(ChallengeAnfrage { public_key }),
        )
        .await;
        assert_eq!(antwort.status(), StatusCode::OK);
        let koerper = json_body(antwort).await;
        let challenge_token = koerper["challengeToken"].as_str().unwrap().to_string();
        let challenge_text = koerper["challengeText"].as_str().unwrap();

        let proof = STANDARD.encode(signing_key.sign(challenge_text.as_bytes()).to_bytes());
        let antwort = post_auth(
            State(state),
            Json(AuthAnfrage {
                challenge_token,
                signed_challenge: proof,
            }),
        )
        .await;
        assert_eq!(antwort.status(), StatusCode::OK);
        let koerper = json_body(antwort).await;
        assert!(!koerper["token"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unbekanntes_geraet_bekommt_404() {
        let (state, _, _) = aufbau().await;

        let antwort = post_challenge(
            State(state),
            Json(ChallengeAnfrage {
                public_key: STANDARD.encode([9u8; 32]),
            }),
        )
        .await;
        assert_eq!(antwort.status(), StatusCode::NOT_FOUND);
        let koerper = json_body(antwort).await;
        assert_eq!(koerper["code"], "UNKNOWN_IDENTITY");
    }

    #[tokio::test]
    async fn falsche_signatur_bekommt_401() {
        let (state, _, public_key) = aufbau().await;

        let antwort = post_challenge(State(state.clone()), Json(ChallengeAnfrage { public_key })).await;
        let koerper = json_body(antwort).await;
        let challenge_token = koerper["challengeToken"].as_str().unwrap().to_string();

        let antwort = post_auth(
            State(state),
            Json(AuthAnfrage {
                challenge_token,
                signed_challenge: STANDARD.encode([0u8; 64]),
            }),
        )
        .await;
        assert_eq!(antwort.status(), StatusCode::UNAUTHORIZED);
        let koerper = json_body(antwort).await;
        assert_eq!(koerper["code"], "PROOF_INVALID");
    }

    #[tokio::test]
    async fn operator_login_liefert_token_mit_ablauf() {
        let (state, _, _) = aufbau().await;

        let antwort = post_login(
            State(state),
            Json(LoginAnfrage {
                username: "zentrale".to_string(),
                password: "zentrale-passwort".to_string(),
            }),
        )
        .await;
        assert_eq!(antwort.status(), StatusCode::OK);
        let koerper = json_body(antwort).await;
        assert!(!koerper["token"].as_str().unwrap().is_empty());
        assert!(koerper["expiresAt"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn falsches_passwort_bekommt_401() {
        let (state, _, _) = aufbau().await;

        let antwort = post_login(
            State(state),
            Json(LoginAnfrage {
                username: "zentrale".to_string(),
                password: "falsch".to_string(),
            }),
        )
        .await;
        assert_eq!(antwort.status(), StatusCode::UNAUTHORIZED);
        let koerper = json_body(antwort).await;
        assert_eq!(koerper["code"], "INVALID_CREDENTIALS");
    }

    #[test]
    fn anfrage_koerper_sind_camel_case() {
        let anfrage: ChallengeAnfrage =
            serde_json::from_str(r#"{"publicKey": "abc"}"#).unwrap();
        assert_eq!(anfrage.public_key, "abc");

        let anfrage: AuthAnfrage = serde_json::from_str(
            r#"{"challengeToken": "t", "signedChallenge": "s"}"#,
        )
        .unwrap();
        assert_eq!(anfrage.challenge_token, "t");
        assert_eq!(anfrage.signed_challenge, "s");
    }
}
