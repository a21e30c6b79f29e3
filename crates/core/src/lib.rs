//! leitstelle-core: Gemeinsame Typen fuer alle Leitstelle-Crates
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Leitstelle-Crates gemeinsam genutzt werden.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{Rolle, VerbindungsId};
