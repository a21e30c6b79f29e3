//! Verbindungs-Register – Alle lebenden Vermittlungs-Verbindungen
//!
//! Haelt pro Verbindung Rolle, Identitaets-Fingerprint und den optionalen
//! Gespraechspartner. Die Kopplungs-Relation ist symmetrisch: wenn A auf B
//! zeigt, zeigt B auf A, und beide Seiten werden im selben Schritt gesetzt
//! bzw. geloescht.
//!
//! Das Register ist selbst nicht thread-safe; die [`Vermittlung`] haelt es
//! zusammen mit der Warteschlange hinter einem gemeinsamen Mutex.
//!
//! [`Vermittlung`]: crate::vermittlung::Vermittlung

use leitstelle_core::types::{Rolle, VerbindungsId};
use leitstelle_protocol::signal::CallerInfo;
use std::collections::HashMap;

use crate::error::{SignalingError, SignalingResult};

// ---------------------------------------------------------------------------
// Verbindung
// ---------------------------------------------------------------------------

/// Eine authentifizierte Vermittlungs-Verbindung
#[derive(Debug, Clone)]
pub struct Verbindung {
    pub id: VerbindungsId,
    pub rolle: Rolle,
    /// Identitaets-Fingerprint aus dem Sitzungs-Token
    pub fingerprint: String,
    /// Aktueller Gespraechspartner, falls gekoppelt
    pub peer: Option<VerbindungsId>,
}

impl Verbindung {
    /// Erstellt eine neue, ungekoppelte Verbindung
    pub fn neu(id: VerbindungsId, rolle: Rolle, fingerprint: impl Into<String>) -> Self {
        Self {
            id,
            rolle,
            fingerprint: fingerprint.into(),
            peer: None,
        }
    }

    /// True wenn die Verbindung in einem Gespraech haengt
    pub fn ist_gekoppelt(&self) -> bool {
        self.peer.is_some()
    }
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

/// Register aller authentifizierten Verbindungen, Anrufer wie Operatoren
///
/// Eine einzige Map fuer beide Rollen; die Rolle steht explizit im
/// Datensatz. Damit gibt es genau einen Suchpfad fuer "finde diese ID,
/// egal welche Seite".
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    verbindungen: HashMap<VerbindungsId, Verbindung>,
    /// Registrierungs-Reihenfolge fuer stabile Schnappschuesse
    reihenfolge: Vec<VerbindungsId>,
}

impl ConnectionRegistry {
    /// Erstellt ein leeres Register
    pub fn neu() -> Self {
        Self::default()
    }

    /// Nimmt eine Verbindung ins Register auf
    ///
    /// Gibt `false` zurueck wenn die ID bereits vergeben ist; der bestehende
    /// Eintrag bleibt dann unangetastet.
    pub fn registrieren(&mut self, verbindung: Verbindung) -> bool {
        if self.verbindungen.contains_key(&verbindung.id) {
            return false;
        }
        self.reihenfolge.push(verbindung.id);
        self.verbindungen.insert(verbindung.id, verbindung);
        true
    }

    /// Entfernt eine Verbindung und gibt den Datensatz zurueck
    pub fn entfernen(&mut self, id: &VerbindungsId) -> Option<Verbindung> {
        let verbindung = self.verbindungen.remove(id)?;
        self.reihenfolge.retain(|v| v != id);
        Some(verbindung)
    }

    /// Sucht eine Verbindung, unabhaengig von ihrer Rolle
    pub fn finden(&self, id: &VerbindungsId) -> Option<&Verbindung> {
        self.verbindungen.get(id)
    }

    /// Koppelt zwei Verbindungen symmetrisch
    ///
    /// Schlaegt fehl wenn eine der beiden IDs fehlt oder eine Seite bereits
    /// einen Partner hat; in dem Fall wird nichts veraendert.
    pub fn koppeln(&mut self, a: &VerbindungsId, b: &VerbindungsId) -> SignalingResult<()> {
        let seite_a = self.verbindungen.get(a).ok_or(SignalingError::NichtGefunden)?;
        let seite_b = self.verbindungen.get(b).ok_or(SignalingError::NichtGefunden)?;

        if seite_a.ist_gekoppelt() || seite_b.ist_gekoppelt() {
            return Err(SignalingError::BereitsGekoppelt);
        }

        // Beide Seiten existieren und sind frei; jetzt erst schreiben
        if let Some(verbindung) = self.verbindungen.get_mut(a) {
            verbindung.peer = Some(*b);
        }
        if let Some(verbindung) = self.verbindungen.get_mut(b) {
            verbindung.peer = Some(*a);
        }
        Ok(())
    }

    /// Loest die Kopplung einer Verbindung, beidseitig
    ///
    /// Gibt den bisherigen Partner zurueck; `None` wenn die Verbindung nicht
    /// gekoppelt war (entkoppeln ist idempotent).
    pub fn entkoppeln(&mut self, id: &VerbindungsId) -> Option<VerbindungsId> {
        let peer = self.verbindungen.get_mut(id)?.peer.take()?;
        if let Some(partner) = self.verbindungen.get_mut(&peer) {
            partner.peer = None;
        }
        Some(peer)
    }

    /// Schnappschuss aller Anrufer in Registrierungs-Reihenfolge
    pub fn caller_schnappschuss(&self) -> Vec<CallerInfo> {
        self.reihenfolge
            .iter()
            .filter_map(|id| self.verbindungen.get(id))
            .filter(|v| v.rolle == Rolle::Caller)
            .map(|v| CallerInfo {
                caller_id: v.id,
                identity: v.fingerprint.clone(),
            })
            .collect()
    }

    /// Anzahl aller registrierten Verbindungen
    pub fn anzahl(&self) -> usize {
        self.verbindungen.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
