//! leitstelle-gateway – REST-Identitaets-Endpunkte
//!
//! Ueber diese HTTP-Schnittstelle beschaffen sich Clients ihr
//! Sitzungs-Token, bevor sie die TCP-Vermittlung kontaktieren:
//!
//! - `POST /api/challenge` – Geraet meldet seinen Public Key, erhaelt eine Challenge
//! - `POST /api/auth`      – Geraet liefert die signierte Challenge, erhaelt ein Token
//! - `POST /api/login`     – Operator meldet sich mit Benutzername/Passwort an
//! - `GET  /health`        – Health-Check
//!
//! Das Gateway haelt keinen eigenen Zustand; saemtliche Pruefungen
//! laufen ueber den [`CredentialVerifier`] aus `leitstelle-auth`.

use std::sync::Arc;

use leitstelle_auth::verifier::CredentialVerifier;
use leitstelle_auth::verzeichnis::{GeraeteVerzeichnis, OperatorVerzeichnis};

pub mod handlers;
pub mod routes;
pub mod server;

pub use routes::api_router;
pub use server::{GatewayKonfig, GatewayServer};

/// Axum-State des Gateways: der gemeinsame Verifier.
pub struct GatewayState<V, O>
where
    V: GeraeteVerzeichnis,
    O: OperatorVerzeichnis,
{
    pub verifier: Arc<CredentialVerifier<V, O>>,
}

// Manuell, damit kein Clone-Bound auf den Verzeichnissen landet.
impl<V, O> Clone for GatewayState<V, O>
where
    V: GeraeteVerzeichnis,
    O: OperatorVerzeichnis,
{
    fn clone(&self) -> Self {
        Self {
            verifier: Arc::clone(&self.verifier),
        }
    }
}

impl<V, O> GatewayState<V, O>
where
    V: GeraeteVerzeichnis,
    O: OperatorVerzeichnis,
{
    pub fn neu(verifier: Arc<CredentialVerifier<V, O>>) -> Self {
        Self { verifier }
    }
}
