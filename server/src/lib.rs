//! leitstelle-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und verdrahtet beim Start alle
//! Subsysteme: Verzeichnis, Token-Dienst, TCP-Vermittlung und
//! REST-Gateway.

pub mod config;

use std::sync::Arc;

use anyhow::Result;
use rand::RngCore;
use tokio::sync::watch;

use leitstelle_auth::challenge::ChallengeStore;
use leitstelle_auth::passwort::passwort_hashen;
use leitstelle_auth::token::{
    TokenDienst, CALLER_TTL_SEKUNDEN, CHALLENGE_TTL_SEKUNDEN, OPERATOR_TTL_SEKUNDEN,
};
use leitstelle_auth::verifier::CredentialVerifier;
use leitstelle_auth::verzeichnis::SpeicherVerzeichnis;
use leitstelle_gateway::{GatewayKonfig, GatewayServer, GatewayState};
use leitstelle_signaling::{VermittlungsConfig, VermittlungsServer, VermittlungsState};

use config::ServerConfig;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Verzeichnis aus der Konfiguration befuellen
    /// 2. Token-Dienst und Challenge-Store aufbauen
    /// 3. TCP-Vermittlung starten (Signal-Frames)
    /// 4. REST-Gateway starten (Challenge/Auth/Login)
    /// 5. Auf Ctrl-C warten, dann Shutdown-Signal verteilen
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            signal = %self.config.signal_bind_adresse(),
            api = %self.config.api_bind_adresse(),
            max_clients = self.config.server.max_clients,
            "Server startet"
        );

        let verzeichnis = verzeichnis_aufbauen(&self.config).await?;
        let token_dienst = token_dienst_aufbauen(&self.config);
        let challenges = ChallengeStore::neu_mit_aufraeumer(ChallengeStore::neu());

        let verifier = Arc::new(CredentialVerifier::neu(
            Arc::clone(&verzeichnis),
            Arc::clone(&verzeichnis),
            challenges,
            Arc::clone(&token_dienst),
        ));

        let state = VermittlungsState::neu(
            VermittlungsConfig {
                server_name: self.config.server.name.clone(),
                max_clients: self.config.server.max_clients,
                max_frame_bytes: self.config.netzwerk.max_frame_bytes,
            },
            Arc::clone(&token_dienst),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let signal_addr = self.config.signal_bind_adresse().parse()?;
        let vermittlung = VermittlungsServer::neu(Arc::clone(&state), signal_addr);
        let mut vermittlung_task = tokio::spawn(vermittlung.starten(shutdown_rx.clone()));

        let gateway = GatewayServer::neu(GatewayKonfig {
            bind_addr: self.config.api_bind_adresse().parse()?,
            cors_origins: self.config.netzwerk.cors_origins.clone(),
        });
        let mut gateway_task = tokio::spawn(gateway.starten(GatewayState::neu(verifier), shutdown_rx));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");

        // Ein vorzeitiges Task-Ende (z.B. Bind-Fehler) beendet den Server.
        tokio::select! {
            ergebnis = tokio::signal::ctrl_c() => {
                ergebnis?;
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            }
            ergebnis = &mut vermittlung_task => {
                ergebnis??;
                anyhow::bail!("Vermittlungs-Server hat sich unerwartet beendet");
            }
            ergebnis = &mut gateway_task => {
                ergebnis??;
                anyhow::bail!("REST-Gateway hat sich unerwartet beendet");
            }
        }

        let _ = shutdown_tx.send(true);
        let (vermittlung_ende, gateway_ende) = tokio::join!(vermittlung_task, gateway_task);
        vermittlung_ende??;
        gateway_ende??;

        tracing::info!("Server beendet");
        Ok(())
    }
}

/// Befuellt das In-Memory-Verzeichnis mit den konfigurierten Eintraegen
async fn verzeichnis_aufbauen(config: &ServerConfig) -> Result<Arc<SpeicherVerzeichnis>> {
    let verzeichnis = Arc::new(SpeicherVerzeichnis::neu());

    for public_key in &config.verzeichnis.geraete {
        let eintrag = verzeichnis.geraet_hinzufuegen(public_key.clone()).await?;
        tracing::info!(
            fingerprint = %eintrag.fingerprint,
            "Geraet aus Konfiguration registriert"
        );
    }

    for konto in &config.verzeichnis.operatoren {
        let hash = match (&konto.passwort_hash, &konto.passwort) {
            (Some(hash), _) => hash.clone(),
            (None, Some(passwort)) => passwort_hashen(passwort)?,
            (None, None) => {
                tracing::warn!(
                    username = %konto.username,
                    "Operator-Konto ohne Passwort wird uebersprungen"
                );
                continue;
            }
        };
        verzeichnis.operator_hinzufuegen(&konto.username, hash).await;
        tracing::info!(username = %konto.username, "Operator-Konto angelegt");
    }

    Ok(verzeichnis)
}

/// Baut den Token-Dienst aus der Konfiguration auf
fn token_dienst_aufbauen(config: &ServerConfig) -> Arc<TokenDienst> {
    let geheimnis: Vec<u8> = match &config.auth.token_geheimnis {
        Some(geheimnis) => geheimnis.as_bytes().to_vec(),
        None => {
            tracing::warn!(
                "Kein token_geheimnis konfiguriert, erzeuge zufaelliges Geheimnis \
                 (Tokens verfallen beim Neustart)"
            );
            let mut zufall = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut zufall);
            zufall.to_vec()
        }
    };

    let auth = &config.auth;
    Arc::new(TokenDienst::mit_ttls(
        &geheimnis,
        auth.caller_ttl_sekunden.unwrap_or(CALLER_TTL_SEKUNDEN),
        auth.operator_ttl_sekunden.unwrap_or(OPERATOR_TTL_SEKUNDEN),
        auth.challenge_ttl_sekunden.unwrap_or(CHALLENGE_TTL_SEKUNDEN),
    ))
}
