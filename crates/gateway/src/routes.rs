//! Route-Definitionen fuer die REST-API (/api/...)

use axum::{
    routing::{get, post},
    Router,
};

use leitstelle_auth::verzeichnis::{GeraeteVerzeichnis, OperatorVerzeichnis};

use crate::{handlers, GatewayState};

/// Erstellt den vollstaendigen Gateway-Router
pub fn api_router<V, O>() -> Router<GatewayState<V, O>>
where
    V: GeraeteVerzeichnis + 'static,
    O: OperatorVerzeichnis + 'static,
{
    Router::new()
        // Geraete-Anmeldung (Challenge/Response)
        .route("/api/challenge", post(handlers::post_challenge))
        .route("/api/auth", post(handlers::post_auth))
        // Operator-Anmeldung
        .route("/api/login", post(handlers::post_login))
        // Health
        .route("/health", get(handlers::get_health))
}
