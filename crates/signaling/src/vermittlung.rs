//! Vermittlung – Register und Warteschlange unter einem gemeinsamen Lock
//!
//! Jede Zustandsaenderung der Vermittlung beruehrt potenziell beides:
//! Kopplungen lesen die Warteschlange (wer gewann die Entnahme?) und das
//! Register (ist die Gegenseite noch da?). Deshalb liegen beide Strukturen
//! hinter einem einzigen Mutex, und jede Operation hier ist ein
//! vollstaendiges Read-Modify-Write innerhalb genau eines Lock-Griffs.
//!
//! Alle Methoden sind synchron und blockieren nie; das Lock wird nie ueber
//! einen Suspension-Punkt gehalten. Versand von Frames passiert ausserhalb:
//! die Methoden geben Ergebnis-Strukturen zurueck, aus denen die Handler
//! ableiten, wen sie benachrichtigen muessen.

use leitstelle_core::types::{Rolle, VerbindungsId};
use leitstelle_protocol::signal::{CallerInfo, QueueEntry};
use parking_lot::Mutex;

use crate::queue::CallQueue;
use crate::registry::{ConnectionRegistry, Verbindung};

// ---------------------------------------------------------------------------
// Ergebnis-Strukturen
// ---------------------------------------------------------------------------

/// Sicht eines frisch angemeldeten Operators auf den aktuellen Zustand
#[derive(Debug)]
pub struct OperatorSicht {
    pub callers: Vec<CallerInfo>,
    pub queue: Vec<QueueEntry>,
}

/// Ergebnis von [`Vermittlung::anruf_einreihen`]
#[derive(Debug)]
pub struct EinreihErgebnis {
    /// 1-basierte Position des Anrufers
    pub position: u32,
    /// True wenn der Anrufer schon eingereiht war (Warteschlange unveraendert)
    pub bereits_eingereiht: bool,
    /// Schnappschuss nach dem Einreihen
    pub schnappschuss: Vec<QueueEntry>,
}

/// Ergebnis von [`Vermittlung::anruf_annehmen`]
#[derive(Debug)]
pub struct AnnahmeErgebnis {
    /// True wenn dieser Aufruf den Warteschlangen-Eintrag entnommen hat
    pub entnommen: bool,
    /// True wenn Operator und Anrufer jetzt gekoppelt sind
    pub gekoppelt: bool,
    /// Schnappschuss nach der Entnahme; nur bei `entnommen` aussagekraeftig
    pub schnappschuss: Vec<QueueEntry>,
}

/// Ergebnis von [`Vermittlung::verbindung_schliessen`]
#[derive(Debug, Default)]
pub struct SchliessErgebnis {
    /// Der entfernte Datensatz; `None` wenn die ID nicht registriert war
    pub verbindung: Option<Verbindung>,
    /// Partner dessen Kopplung durch das Schliessen aufgeloest wurde
    pub ehemaliger_peer: Option<VerbindungsId>,
    /// True wenn ein Warteschlangen-Eintrag mit entfernt wurde
    pub queue_geaendert: bool,
    /// Schnappschuss nach der Aenderung; nur bei `queue_geaendert` relevant
    pub schnappschuss: Vec<QueueEntry>,
}

// ---------------------------------------------------------------------------
// Vermittlung
// ---------------------------------------------------------------------------

struct VermittlungsKern {
    registry: ConnectionRegistry,
    queue: CallQueue,
}

/// Gemeinsamer Vermittlungs-Zustand hinter einem Mutex
pub struct Vermittlung {
    kern: Mutex<VermittlungsKern>,
}

impl Vermittlung {
    /// Erstellt eine leere Vermittlung
    pub fn neu() -> Self {
        Self {
            kern: Mutex::new(VermittlungsKern {
                registry: ConnectionRegistry::neu(),
                queue: CallQueue::neu(),
            }),
        }
    }

    /// Meldet einen authentifizierten Anrufer an
    pub fn caller_anmelden(&self, id: VerbindungsId, fingerprint: &str) {
        let mut kern = self.kern.lock();
        if !kern
            .registry
            .registrieren(Verbindung::neu(id, Rolle::Caller, fingerprint))
        {
            tracing::warn!(verbindung = %id, "Verbindungs-ID bereits registriert");
        }
    }

    /// Meldet einen authentifizierten Operator an
    ///
    /// Gibt die aktuelle Sicht (Anrufer + Warteschlange) zurueck, die dem
    /// Operator als Begruessungs-Schnappschuss geschickt wird.
    pub fn operator_anmelden(&self, id: VerbindungsId, fingerprint: &str) -> OperatorSicht {
        let mut kern = self.kern.lock();
        if !kern
            .registry
            .registrieren(Verbindung::neu(id, Rolle::Operator, fingerprint))
        {
            tracing::warn!(verbindung = %id, "Verbindungs-ID bereits registriert");
        }
        OperatorSicht {
            callers: kern.registry.caller_schnappschuss(),
            queue: kern.queue.schnappschuss(),
        }
    }

    /// Reiht einen registrierten Anrufer in die Warteschlange ein
    ///
    /// `None` wenn die Verbindung nicht (mehr) im Register steht.
    pub fn anruf_einreihen(&self, caller_id: &VerbindungsId) -> Option<EinreihErgebnis> {
        let mut kern = self.kern.lock();
        let fingerprint = kern.registry.finden(caller_id)?.fingerprint.clone();

        let bereits_eingereiht = kern.queue.enthaelt(caller_id);
        let position = kern.queue.einreihen(*caller_id, fingerprint);

        Some(EinreihErgebnis {
            position,
            bereits_eingereiht,
            schnappschuss: kern.queue.schnappschuss(),
        })
    }

    /// Operator beansprucht einen wartenden Anrufer
    ///
    /// Die Entnahme aus der Warteschlange entscheidet das Rennen: nur wer
    /// den Eintrag tatsaechlich entnimmt, koppelt auch. War der Eintrag
    /// schon weg (anderer Operator schneller, Anrufer getrennt), passiert
    /// nichts weiter; das ist fuer den Aufrufer kein Fehler.
    pub fn anruf_annehmen(
        &self,
        operator_id: &VerbindungsId,
        caller_id: &VerbindungsId,
    ) -> AnnahmeErgebnis {
        let mut kern = self.kern.lock();

        if !kern.queue.entfernen(caller_id) {
            return AnnahmeErgebnis {
                entnommen: false,
                gekoppelt: false,
                schnappschuss: Vec::new(),
            };
        }

        let gekoppelt = match kern.registry.koppeln(operator_id, caller_id) {
            Ok(()) => true,
            Err(fehler) => {
                // Ein eingereihter Anrufer ist immer registriert und frei;
                // hierher fuehrt nur eine verletzte Zustands-Invariante.
                tracing::warn!(
                    operator = %operator_id,
                    caller = %caller_id,
                    fehler = %fehler,
                    "Kopplung nach Warteschlangen-Entnahme fehlgeschlagen"
                );
                false
            }
        };

        AnnahmeErgebnis {
            entnommen: true,
            gekoppelt,
            schnappschuss: kern.queue.schnappschuss(),
        }
    }

    /// Beendet ein laufendes Gespraech, von welcher Seite auch immer
    ///
    /// Gibt den bisherigen Partner zurueck, damit er benachrichtigt werden
    /// kann. Idempotent: ohne Kopplung passiert nichts.
    pub fn gespraech_beenden(&self, id: &VerbindungsId) -> Option<VerbindungsId> {
        self.kern.lock().registry.entkoppeln(id)
    }

    /// Bestimmt das Ziel fuer ein Relay-Frame
    ///
    /// Ein bestehender Partner hat Vorrang; nur ohne Kopplung zaehlt das
    /// explizite `to`-Feld des Absenders.
    pub fn relay_ziel(
        &self,
        absender: &VerbindungsId,
        explizit: Option<VerbindungsId>,
    ) -> Option<VerbindungsId> {
        let kern = self.kern.lock();
        match kern.registry.finden(absender).and_then(|v| v.peer) {
            Some(peer) => Some(peer),
            None => explizit,
        }
    }

    /// Raeumt eine geschlossene Verbindung vollstaendig ab
    ///
    /// Entkoppelt, entfernt den Warteschlangen-Eintrag und streicht den
    /// Register-Datensatz, alles unter einem Lock-Griff.
    pub fn verbindung_schliessen(&self, id: &VerbindungsId) -> SchliessErgebnis {
        let mut kern = self.kern.lock();

        let ehemaliger_peer = kern.registry.entkoppeln(id);
        let queue_geaendert = kern.queue.entfernen(id);
        let verbindung = kern.registry.entfernen(id);

        let schnappschuss = if queue_geaendert {
            kern.queue.schnappschuss()
        } else {
            Vec::new()
        };

        SchliessErgebnis {
            verbindung,
            ehemaliger_peer,
            queue_geaendert,
            schnappschuss,
        }
    }

    /// Kopie des Register-Datensatzes einer Verbindung
    pub fn verbindung_finden(&self, id: &VerbindungsId) -> Option<Verbindung> {
        self.kern.lock().registry.finden(id).cloned()
    }

    /// Anzahl der registrierten Verbindungen
    pub fn anzahl_verbindungen(&self) -> usize {
        self.kern.lock().registry.anzahl()
    }

    /// Anzahl der wartenden Anrufer
    pub fn warteschlangen_laenge(&self) -> usize {
        self.kern.lock().queue.laenge()
    }
}

impl Default for Vermittlung {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
