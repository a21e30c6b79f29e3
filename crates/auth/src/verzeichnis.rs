//! Verzeichnis-Anbindung fuer Geraete und Operator-Konten
//!
//! Das Verzeichnis ist die Quelle der Wahrheit darueber, welche Geraete
//! und Operatoren existieren. Die Traits entkoppeln den Verifier von der
//! konkreten Ablage; [`SpeicherVerzeichnis`] haelt alles im Speicher und
//! wird beim Serverstart aus der Konfiguration befuellt.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{AuthError, AuthResult};
use crate::nachweis::fingerprint_berechnen;

/// Verzeichnis-Eintrag eines Geraets
#[derive(Debug, Clone)]
pub struct GeraetEintrag {
    /// Oeffentlicher Ed25519-Schluessel (Base64, 32 Bytes)
    pub public_key: String,
    /// Fingerprint des Schluessels, kanonische Identitaet des Geraets
    pub fingerprint: String,
    /// Gesperrte Geraete koennen keine Challenges anfordern
    pub aktiv: bool,
    /// Letzter erfolgreicher Challenge-Abschluss
    pub zuletzt_gesehen: Option<DateTime<Utc>>,
}

/// Verzeichnis-Eintrag eines Operator-Kontos
#[derive(Debug, Clone)]
pub struct OperatorEintrag {
    pub username: String,
    /// Argon2id-Hash im PHC-Format
    pub passwort_hash: String,
    pub aktiv: bool,
}

/// Zugriff auf registrierte Geraete
#[async_trait]
pub trait GeraeteVerzeichnis: Send + Sync {
    /// Laedt ein Geraet anhand seines oeffentlichen Schluessels
    async fn laden_nach_schluessel(&self, public_key: &str) -> AuthResult<Option<GeraetEintrag>>;

    /// Setzt den Zeitstempel des letzten erfolgreichen Nachweises
    async fn zuletzt_gesehen_aktualisieren(&self, public_key: &str) -> AuthResult<()>;
}

/// Zugriff auf Operator-Konten
#[async_trait]
pub trait OperatorVerzeichnis: Send + Sync {
    /// Laedt ein Operator-Konto anhand des Benutzernamens
    async fn laden_nach_name(&self, username: &str) -> AuthResult<Option<OperatorEintrag>>;
}

/// In-Memory-Verzeichnis fuer beide Kontoarten
#[derive(Debug, Default)]
pub struct SpeicherVerzeichnis {
    /// public_key -> Geraet
    geraete: RwLock<HashMap<String, GeraetEintrag>>,
    /// username -> Operator
    operatoren: RwLock<HashMap<String, OperatorEintrag>>,
}

impl SpeicherVerzeichnis {
    /// Erstellt ein leeres Verzeichnis
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert ein Geraet; der Fingerprint wird aus dem Schluessel
    /// abgeleitet und dabei dessen Form validiert
    pub async fn geraet_hinzufuegen(&self, public_key: impl Into<String>) -> AuthResult<GeraetEintrag> {
        let public_key = public_key.into();
        let eintrag = GeraetEintrag {
            fingerprint: fingerprint_berechnen(&public_key)?,
            public_key: public_key.clone(),
            aktiv: true,
            zuletzt_gesehen: None,
        };

        self.geraete
            .write()
            .await
            .insert(public_key, eintrag.clone());
        Ok(eintrag)
    }

    /// Registriert ein Operator-Konto mit fertigem Passwort-Hash
    pub async fn operator_hinzufuegen(
        &self,
        username: impl Into<String>,
        passwort_hash: impl Into<String>,
    ) {
        let username = username.into();
        let eintrag = OperatorEintrag {
            username: username.clone(),
            passwort_hash: passwort_hash.into(),
            aktiv: true,
        };
        self.operatoren.write().await.insert(username, eintrag);
    }

    /// Sperrt ein Geraet ohne es zu loeschen
    pub async fn geraet_sperren(&self, public_key: &str) -> bool {
        let mut geraete = self.geraete.write().await;
        match geraete.get_mut(public_key) {
            Some(eintrag) => {
                eintrag.aktiv = false;
                true
            }
            None => false,
        }
    }

    /// Anzahl registrierter Geraete
    pub async fn anzahl_geraete(&self) -> usize {
        self.geraete.read().await.len()
    }

    /// Anzahl registrierter Operator-Konten
    pub async fn anzahl_operatoren(&self) -> usize {
        self.operatoren.read().await.len()
    }
}

#[async_trait]
impl GeraeteVerzeichnis for SpeicherVerzeichnis {
    async fn laden_nach_schluessel(&self, public_key: &str) -> AuthResult<Option<GeraetEintrag>> {
        Ok(self.geraete.read().await.get(public_key).cloned())
    }

    async fn zuletzt_gesehen_aktualisieren(&self, public_key: &str) -> AuthResult<()> {
        let mut geraete = self.geraete.write().await;
        let eintrag = geraete
            .get_mut(public_key)
            .ok_or_else(|| AuthError::UnbekannteIdentitaet(public_key.to_string()))?;
        eintrag.zuletzt_gesehen = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl OperatorVerzeichnis for SpeicherVerzeichnis {
    async fn laden_nach_name(&self, username: &str) -> AuthResult<Option<OperatorEintrag>> {
        Ok(self.operatoren.read().await.get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn test_public_key() -> String {
        let key = SigningKey::generate(&mut OsRng);
        STANDARD.encode(key.verifying_key().to_bytes())
    }

    #[tokio::test]
    async fn geraet_hinzufuegen_und_laden() {
        let verzeichnis = SpeicherVerzeichnis::neu();
        let pk = test_public_key();

        let eintrag = verzeichnis.geraet_hinzufuegen(pk.clone()).await.unwrap();
        assert!(eintrag.aktiv);
        assert!(eintrag.zuletzt_gesehen.is_none());

        let geladen = verzeichnis.laden_nach_schluessel(&pk).await.unwrap();
        assert_eq!(geladen.unwrap().fingerprint, eintrag.fingerprint);
    }

    #[tokio::test]
    async fn kaputter_schluessel_wird_nicht_aufgenommen() {
        let verzeichnis = SpeicherVerzeichnis::neu();
        assert!(verzeichnis.geraet_hinzufuegen("kein-schluessel").await.is_err());
        assert_eq!(verzeichnis.anzahl_geraete().await, 0);
    }

    #[tokio::test]
    async fn unbekannter_schluessel_liefert_none() {
        let verzeichnis = SpeicherVerzeichnis::neu();
        let geladen = verzeichnis.laden_nach_schluessel("pk-unbekannt").await.unwrap();
        assert!(geladen.is_none());
    }

    #[tokio::test]
    async fn zuletzt_gesehen_wird_gesetzt() {
        let verzeichnis = SpeicherVerzeichnis::neu();
        let pk = test_public_key();
        verzeichnis.geraet_hinzufuegen(pk.clone()).await.unwrap();

        verzeichnis.zuletzt_gesehen_aktualisieren(&pk).await.unwrap();
        let geladen = verzeichnis.laden_nach_schluessel(&pk).await.unwrap().unwrap();
        assert!(geladen.zuletzt_gesehen.is_some());
    }

    #[tokio::test]
    async fn geraet_sperren() {
        let verzeichnis = SpeicherVerzeichnis::neu();
        let pk = test_public_key();
        verzeichnis.geraet_hinzufuegen(pk.clone()).await.unwrap();

        assert!(verzeichnis.geraet_sperren(&pk).await);
        let geladen = verzeichnis.laden_nach_schluessel(&pk).await.unwrap().unwrap();
        assert!(!geladen.aktiv);
    }

    #[tokio::test]
    async fn operator_hinzufuegen_und_laden() {
        let verzeichnis = SpeicherVerzeichnis::neu();
        verzeichnis.operator_hinzufuegen("zentrale", "$argon2id$dummy").await;

        let geladen = verzeichnis.laden_nach_name("zentrale").await.unwrap();
        assert_eq!(geladen.unwrap().username, "zentrale");
        assert!(verzeichnis.laden_nach_name("niemand").await.unwrap().is_none());
    }
}
