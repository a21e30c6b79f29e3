//! Credential-Verifier fuer Leitstelle
//!
//! Zentraler Dienst fuer die drei Identitaetswege: Challenge-Ausstellung,
//! Challenge-Antwort (Geraete) und Passwort-Login (Operatoren). Nutzt die
//! Verzeichnis-Traits, den Challenge-Store und den Token-Dienst.

use std::sync::Arc;

use leitstelle_core::Rolle;

use crate::{
    challenge::ChallengeStore,
    error::{AuthError, AuthResult},
    nachweis::nachweis_pruefen,
    passwort::passwort_verifizieren,
    token::{AusgestelltesToken, SitzungsIdentitaet, TokenDienst},
    verzeichnis::{GeraetEintrag, GeraeteVerzeichnis, OperatorVerzeichnis},
};

/// Antwort auf eine Challenge-Anforderung
#[derive(Debug, Clone)]
pub struct AusgestellteChallenge {
    /// Text den das Geraet signieren soll
    pub challenge_text: String,
    /// Signierter Umschlag fuer den Antwort-Schritt
    pub challenge_token: String,
}

/// Credential-Verifier; zentraler Einstiegspunkt fuer alle Identitaetspruefungen
pub struct CredentialVerifier<V: GeraeteVerzeichnis, O: OperatorVerzeichnis> {
    geraete: Arc<V>,
    operatoren: Arc<O>,
    challenges: Arc<ChallengeStore>,
    tokens: Arc<TokenDienst>,
}

impl<V: GeraeteVerzeichnis, O: OperatorVerzeichnis> CredentialVerifier<V, O> {
    /// Erstellt einen neuen Verifier
    pub fn neu(
        geraete: Arc<V>,
        operatoren: Arc<O>,
        challenges: Arc<ChallengeStore>,
        tokens: Arc<TokenDienst>,
    ) -> Self {
        Self {
            geraete,
            operatoren,
            challenges,
            tokens,
        }
    }

    /// Stellt eine Challenge fuer ein registriertes Geraet aus
    ///
    /// Eine offene Challenge desselben Geraets wird ersetzt.
    pub async fn challenge_ausstellen(&self, identity_key: &str) -> AuthResult<AusgestellteChallenge> {
        let geraet = self.aktives_geraet_laden(identity_key).await?;

        let challenge = self.challenges.ausstellen(identity_key).await;
        let challenge_token = self
            .tokens
            .challenge_ausstellen(identity_key, &challenge.text)?;

        tracing::debug!(
            fingerprint = %geraet.fingerprint,
            "Challenge fuer Geraet ausgestellt"
        );

        Ok(AusgestellteChallenge {
            challenge_text: challenge.text,
            challenge_token,
        })
    }

    /// Prueft die signierte Antwort auf eine Challenge
    ///
    /// Die Challenge wird beim ersten passenden Zugriff verbraucht, auch
    /// wenn die Signatur danach nicht besteht; ein erneuter Versuch
    /// braucht eine frische Challenge. Erst nach bestandenem Nachweis
    /// wird das Sitzungs-Token ausgestellt und der Geraete-Eintrag
    /// aktualisiert.
    pub async fn challenge_antwort_pruefen(
        &self,
        challenge_token: &str,
        proof: &str,
    ) -> AuthResult<AusgestelltesToken> {
        // Umschlag zuerst; ein abgelaufenes Token beruehrt den Store nicht
        let claims = self.tokens.challenge_pruefen(challenge_token)?;

        let genommen = self
            .challenges
            .nehmen_wenn_passend(&claims.sub, &claims.challenge)
            .await;
        if !genommen {
            return Err(AuthError::ChallengeNichtGefunden);
        }

        let geraet = self.aktives_geraet_laden(&claims.sub).await?;

        if !nachweis_pruefen(&geraet.public_key, &claims.challenge, proof) {
            tracing::warn!(
                fingerprint = %geraet.fingerprint,
                "Challenge-Antwort mit ungueltiger Signatur"
            );
            return Err(AuthError::NachweisUngueltig);
        }

        self.geraete
            .zuletzt_gesehen_aktualisieren(&claims.sub)
            .await?;

        let token = self
            .tokens
            .sitzung_ausstellen(&geraet.fingerprint, Rolle::Caller)?;

        tracing::info!(
            fingerprint = %geraet.fingerprint,
            "Geraet authentifiziert"
        );

        Ok(token)
    }

    /// Prueft Operator-Anmeldedaten und stellt ein Sitzungs-Token aus
    ///
    /// Unbekannte Konten, gesperrte Konten und falsche Passwoerter fallen
    /// alle in denselben Fehler.
    pub async fn passwort_pruefen(
        &self,
        username: &str,
        passwort: &str,
    ) -> AuthResult<AusgestelltesToken> {
        let konto = self
            .operatoren
            .laden_nach_name(username)
            .await?
            .filter(|k| k.aktiv)
            .ok_or(AuthError::UngueltigeAnmeldedaten)?;

        let korrekt = passwort_verifizieren(passwort, &konto.passwort_hash)?;
        if !korrekt {
            tracing::warn!(username = %username, "Fehlgeschlagener Operator-Login");
            return Err(AuthError::UngueltigeAnmeldedaten);
        }

        let token = self
            .tokens
            .sitzung_ausstellen(&konto.username, Rolle::Operator)?;

        tracing::info!(username = %username, "Operator angemeldet");
        Ok(token)
    }

    /// Prueft ein Sitzungs-Token
    ///
    /// Rein rechnerisch, kein Verzeichniszugriff; darf deshalb aus dem
    /// Vermittlungspfad heraus synchron aufgerufen werden.
    pub fn token_pruefen(&self, token: &str) -> AuthResult<SitzungsIdentitaet> {
        self.tokens.sitzung_pruefen(token)
    }

    async fn aktives_geraet_laden(&self, identity_key: &str) -> AuthResult<GeraetEintrag> {
        self.geraete
            .laden_nach_schluessel(identity_key)
            .await?
            .filter(|g| g.aktiv)
            .ok_or_else(|| AuthError::UnbekannteIdentitaet(identity_key.to_string()))
    }
}
