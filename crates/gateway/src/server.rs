//! Axum HTTP-Server fuer das Identitaets-Gateway

use std::net::SocketAddr;

use anyhow::Result;
use axum::http::{HeaderValue, Method};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use leitstelle_auth::verzeichnis::{GeraeteVerzeichnis, OperatorVerzeichnis};

use crate::routes::api_router;
use crate::GatewayState;

/// Gateway-Server-Konfiguration
#[derive(Debug, Clone)]
pub struct GatewayKonfig {
    pub bind_addr: SocketAddr,
    /// Erlaubte CORS-Origins. Leer = alle Origins erlaubt (nur fuer Entwicklung).
    pub cors_origins: Vec<String>,
}

impl Default for GatewayKonfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().unwrap(),
            cors_origins: vec![],
        }
    }
}

/// Axum HTTP-Server fuer die Identitaets-Endpunkte
pub struct GatewayServer {
    konfig: GatewayKonfig,
}

impl GatewayServer {
    pub fn neu(konfig: GatewayKonfig) -> Self {
        Self { konfig }
    }

    /// Startet den HTTP-Server; laeuft bis das Shutdown-Signal kommt.
    pub async fn starten<V, O>(
        self,
        state: GatewayState<V, O>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()>
    where
        V: GeraeteVerzeichnis + 'static,
        O: OperatorVerzeichnis + 'static,
    {
        // CORS konfigurieren: entweder spezifische Origins oder Any
        let cors = if self.konfig.cors_origins.is_empty() {
            CorsLayer::permissive()
        } else {
            let origins: Vec<HeaderValue> = self
                .konfig
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(tower_http::cors::Any)
        };

        let app = api_router()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(self.konfig.bind_addr).await?;
        tracing::info!(adresse = %self.konfig.bind_addr, "REST-Gateway gestartet");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                // Wartet auf das erste echte Shutdown-Signal
                while shutdown_rx.changed().await.is_ok() {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            })
            .await?;

        tracing::info!("REST-Gateway beendet");
        Ok(())
    }
}
