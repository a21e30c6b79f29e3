//! Anruf-Warteschlange – Wartende Anrufer in strikter FIFO-Reihenfolge
//!
//! Pro Anrufer hoechstens ein Eintrag; erneutes Einreihen liefert die
//! bestehende Position statt zu duplizieren. Entnommen wird gezielt per
//! Anrufer-ID: die Reihenfolge bestimmt die angezeigte Position, nicht
//! welche Eintraege ein Operator beanspruchen darf.
//!
//! Wie das Register nicht selbst thread-safe; der gemeinsame Mutex liegt
//! in der [`Vermittlung`].
//!
//! [`Vermittlung`]: crate::vermittlung::Vermittlung

use chrono::{DateTime, Utc};
use leitstelle_core::types::VerbindungsId;
use leitstelle_protocol::signal::QueueEntry;
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// WarteschlangenEintrag
// ---------------------------------------------------------------------------

/// Ein wartender Anrufer
#[derive(Debug, Clone)]
pub struct WarteschlangenEintrag {
    pub caller_id: VerbindungsId,
    pub fingerprint: String,
    pub eingereiht_am: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// CallQueue
// ---------------------------------------------------------------------------

/// FIFO-Warteschlange der offenen Anruf-Anfragen
#[derive(Debug, Default)]
pub struct CallQueue {
    eintraege: VecDeque<WarteschlangenEintrag>,
}

impl CallQueue {
    /// Erstellt eine leere Warteschlange
    pub fn neu() -> Self {
        Self::default()
    }

    /// Reiht einen Anrufer ein und gibt seine Position zurueck (1 = vorn)
    ///
    /// Ist der Anrufer bereits eingereiht, bleibt die Warteschlange
    /// unveraendert und die bestehende Position wird gemeldet.
    pub fn einreihen(&mut self, caller_id: VerbindungsId, fingerprint: impl Into<String>) -> u32 {
        if let Some(position) = self.position(&caller_id) {
            return position;
        }

        self.eintraege.push_back(WarteschlangenEintrag {
            caller_id,
            fingerprint: fingerprint.into(),
            eingereiht_am: Utc::now(),
        });
        self.eintraege.len() as u32
    }

    /// Entfernt den Eintrag eines Anrufers, egal an welcher Position
    ///
    /// Gibt `true` zurueck wenn ein Eintrag entfernt wurde. Unter
    /// konkurrierenden Entnahmen gewinnt genau ein Aufrufer; alle weiteren
    /// sehen `false`.
    pub fn entfernen(&mut self, caller_id: &VerbindungsId) -> bool {
        match self.eintraege.iter().position(|e| e.caller_id == *caller_id) {
            Some(index) => {
                self.eintraege.remove(index);
                true
            }
            None => false,
        }
    }

    /// 1-basierte Position eines Anrufers, falls eingereiht
    pub fn position(&self, caller_id: &VerbindungsId) -> Option<u32> {
        self.eintraege
            .iter()
            .position(|e| e.caller_id == *caller_id)
            .map(|index| index as u32 + 1)
    }

    /// True wenn der Anrufer eingereiht ist
    pub fn enthaelt(&self, caller_id: &VerbindungsId) -> bool {
        self.position(caller_id).is_some()
    }

    /// Schnappschuss in Einreih-Reihenfolge fuer Operator-Broadcasts
    pub fn schnappschuss(&self) -> Vec<QueueEntry> {
        self.eintraege
            .iter()
            .map(|e| QueueEntry {
                caller_id: e.caller_id,
                identity: e.fingerprint.clone(),
                enqueued_at: e.eingereiht_am.timestamp(),
            })
            .collect()
    }

    /// Anzahl der wartenden Anrufer
    pub fn laenge(&self) -> usize {
        self.eintraege.len()
    }

    /// True wenn niemand wartet
    pub fn ist_leer(&self) -> bool {
        self.eintraege.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
