//! Challenge-Verwaltung fuer den Geraete-Nachweis
//!
//! Challenges werden im Speicher gehalten (HashMap mit TTL) und leben
//! genau einmal: [`ChallengeStore::nehmen_wenn_passend`] prueft und
//! loescht atomar unter dem Write-Lock, von parallelen Antworten auf
//! dieselbe Challenge gewinnt also hoechstens eine. Ein Hintergrund-Task
//! bereinigt liegengebliebene Eintraege.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::RngCore;
use tokio::sync::RwLock;

/// Standard-Lebensdauer einer Challenge: 5 Minuten
const CHALLENGE_TTL_SEKUNDEN: i64 = 5 * 60;

/// Intervall fuer den automatischen Aufraeum-Task: 60 Sekunden
const AUFRAEUM_INTERVALL: Duration = Duration::from_secs(60);

/// Eine offene Challenge
#[derive(Debug, Clone)]
pub struct Challenge {
    /// Oeffentlicher Schluessel der die Challenge angefordert hat
    pub identity_key: String,
    /// Zufaelliger Text der signiert werden soll
    pub text: String,
    /// Zeitpunkt der Ausstellung
    pub ausgestellt_am: DateTime<Utc>,
    /// Zeitpunkt des Ablaufs
    pub laeuft_ab_am: DateTime<Utc>,
}

impl Challenge {
    /// Gibt `true` zurueck solange die Challenge nicht abgelaufen ist
    pub fn ist_gueltig(&self) -> bool {
        Utc::now() < self.laeuft_ab_am
    }
}

/// In-Memory-Store fuer offene Challenges
///
/// Pro Schluessel ist hoechstens eine Challenge offen; eine neue
/// Anforderung ueberschreibt die alte.
#[derive(Debug)]
pub struct ChallengeStore {
    /// identity_key -> Challenge
    challenges: RwLock<HashMap<String, Challenge>>,
    ttl: chrono::Duration,
}

impl ChallengeStore {
    /// Erstellt einen leeren Store mit Standard-TTL
    pub fn neu() -> Arc<Self> {
        Self::mit_ttl(chrono::Duration::seconds(CHALLENGE_TTL_SEKUNDEN))
    }

    /// Erstellt einen leeren Store mit abweichender TTL
    pub fn mit_ttl(ttl: chrono::Duration) -> Arc<Self> {
        Arc::new(Self {
            challenges: RwLock::new(HashMap::new()),
            ttl,
        })
    }

    /// Startet den Aufraeum-Task fuer einen bestehenden Store
    pub fn neu_mit_aufraeumer(store: Arc<Self>) -> Arc<Self> {
        let store_klon = Arc::clone(&store);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(AUFRAEUM_INTERVALL).await;
                let entfernt = store_klon.aufraeumen().await;
                if entfernt > 0 {
                    tracing::debug!(anzahl = entfernt, "Abgelaufene Challenges bereinigt");
                }
            }
        });
        store
    }

    /// Stellt eine neue Challenge fuer den Schluessel aus
    ///
    /// Eine bereits offene Challenge desselben Schluessels wird dabei
    /// ersetzt; Antworten auf die alte Challenge laufen danach ins Leere.
    pub async fn ausstellen(&self, identity_key: &str) -> Challenge {
        let jetzt = Utc::now();
        let challenge = Challenge {
            identity_key: identity_key.to_string(),
            text: challenge_text_generieren(),
            ausgestellt_am: jetzt,
            laeuft_ab_am: jetzt + self.ttl,
        };

        self.challenges
            .write()
            .await
            .insert(identity_key.to_string(), challenge.clone());
        tracing::debug!(identity_key = %identity_key, "Challenge ausgestellt");
        challenge
    }

    /// Nimmt die Challenge des Schluessels, wenn der Text passt
    ///
    /// Pruefen und Loeschen passieren unter demselben Write-Lock; bei
    /// parallelen Antworten gewinnt genau eine. Abgelaufene Eintraege
    /// werden dabei entsorgt. Bei Text-Mismatch bleibt die offene
    /// Challenge bestehen (sie koennte frisch ueberschrieben worden sein).
    pub async fn nehmen_wenn_passend(&self, identity_key: &str, text: &str) -> bool {
        let mut challenges = self.challenges.write().await;

        match challenges.get(identity_key) {
            None => false,
            Some(c) if !c.ist_gueltig() => {
                challenges.remove(identity_key);
                false
            }
            Some(c) if c.text != text => false,
            Some(_) => {
                challenges.remove(identity_key);
                true
            }
        }
    }

    /// Bereinigt abgelaufene Challenges und gibt deren Anzahl zurueck
    pub async fn aufraeumen(&self) -> usize {
        let jetzt = Utc::now();
        let mut challenges = self.challenges.write().await;
        let vorher = challenges.len();
        challenges.retain(|_, c| c.laeuft_ab_am > jetzt);
        vorher - challenges.len()
    }

    /// Anzahl der derzeit offenen (auch schon abgelaufenen) Challenges
    pub async fn anzahl_offen(&self) -> usize {
        self.challenges.read().await.len()
    }
}

/// Generiert einen kryptografisch zufaelligen Challenge-Text (Base64)
fn challenge_text_generieren() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ausstellen_und_nehmen() {
        let store = ChallengeStore::neu();
        let challenge = store.ausstellen("pk-1").await;

        assert!(challenge.ist_gueltig());
        assert!(store.nehmen_wenn_passend("pk-1", &challenge.text).await);
    }

    #[tokio::test]
    async fn nehmen_ist_einmalig() {
        let store = ChallengeStore::neu();
        let challenge = store.ausstellen("pk-1").await;

        assert!(store.nehmen_wenn_passend("pk-1", &challenge.text).await);
        assert!(
            !store.nehmen_wenn_passend("pk-1", &challenge.text).await,
            "Zweiter Verbrauch derselben Challenge muss fehlschlagen"
        );
    }

    #[tokio::test]
    async fn falscher_text_laesst_challenge_stehen() {
        let store = ChallengeStore::neu();
        let challenge = store.ausstellen("pk-1").await;

        assert!(!store.nehmen_wenn_passend("pk-1", "anderer-text").await);
        // Die richtige Antwort funktioniert weiterhin
        assert!(store.nehmen_wenn_passend("pk-1", &challenge.text).await);
    }

    #[tokio::test]
    async fn neue_challenge_ersetzt_alte() {
        let store = ChallengeStore::neu();
        let alte = store.ausstellen("pk-1").await;
        let neue = store.ausstellen("pk-1").await;
        assert_ne!(alte.text, neue.text);

        assert!(!store.nehmen_wenn_passend("pk-1", &alte.text).await);
        assert!(store.nehmen_wenn_passend("pk-1", &neue.text).await);
    }

    #[tokio::test]
    async fn unbekannter_schluessel_nimmt_nichts() {
        let store = ChallengeStore::neu();
        assert!(!store.nehmen_wenn_passend("pk-unbekannt", "text").await);
    }

    #[tokio::test]
    async fn abgelaufene_challenge_wird_nicht_genommen() {
        let store = ChallengeStore::mit_ttl(chrono::Duration::seconds(0));
        let challenge = store.ausstellen("pk-1").await;

        assert!(!store.nehmen_wenn_passend("pk-1", &challenge.text).await);
        // Der abgelaufene Eintrag wurde dabei entsorgt
        assert_eq!(store.anzahl_offen().await, 0);
    }

    #[tokio::test]
    async fn aufraeumen_entfernt_nur_abgelaufene() {
        let kurz = ChallengeStore::mit_ttl(chrono::Duration::seconds(0));
        kurz.ausstellen("pk-alt").await;
        assert_eq!(kurz.aufraeumen().await, 1);

        let lang = ChallengeStore::neu();
        lang.ausstellen("pk-frisch").await;
        assert_eq!(lang.aufraeumen().await, 0);
        assert_eq!(lang.anzahl_offen().await, 1);
    }

    #[tokio::test]
    async fn parallele_antworten_genau_ein_gewinner() {
        let store = ChallengeStore::neu();
        let challenge = store.ausstellen("pk-1").await;

        let (a, b) = tokio::join!(
            store.nehmen_wenn_passend("pk-1", &challenge.text),
            store.nehmen_wenn_passend("pk-1", &challenge.text),
        );
        assert!(a ^ b, "Genau eine der beiden Antworten darf gewinnen");
    }
}
