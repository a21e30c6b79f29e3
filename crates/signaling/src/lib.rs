//! leitstelle-signaling – Session-Vermittlung ueber TCP
//!
//! Dieser Crate implementiert den Vermittlungs-Service der Leitstelle.
//! Er verwaltet TCP-Verbindungen, prueft Sitzungs-Token, fuehrt die
//! Anruf-Warteschlange und reicht Signalisierungs-Frames zwischen
//! gekoppelten Gespraechspartnern durch.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (VermittlungsServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  Erstes Frame muss Authenticate sein
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- AuthHandler   (Authenticate, Rollen-Anmeldung)
//!     +-- AnrufHandler  (RequestCall, TakeCall, EndCall)
//!     +-- RelayHandler  (Offer, Answer, Candidate, MuteStatus, AudioData)
//!
//! Vermittlung      – Registry und Warteschlange unter einem Lock
//! EventBroadcaster – Frames gezielt oder an alle Operatoren senden
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod queue;
pub mod registry;
pub mod server_state;
pub mod tcp;
pub mod vermittlung;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use connection::ClientConnection;
pub use dispatcher::{DispatchErgebnis, DispatcherContext, MessageDispatcher};
pub use error::{SignalingError, SignalingResult};
pub use queue::{CallQueue, WarteschlangenEintrag};
pub use registry::{ConnectionRegistry, Verbindung};
pub use server_state::{VermittlungsConfig, VermittlungsState};
pub use tcp::VermittlungsServer;
pub use vermittlung::Vermittlung;
