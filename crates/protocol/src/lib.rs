//! leitstelle-protocol: Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Signal-Nachrichten sowie das Wire-Format
//! das zwischen Geraeten, Operatoren und dem Server gesprochen wird.

pub mod signal;
pub mod wire;

pub use signal::{ErrorCode, SignalMessage};
pub use wire::{EmpfangenesFrame, FrameCodec, SendeFrame};
