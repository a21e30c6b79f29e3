//! Handler fuer alle Signal-Nachrichten
//!
//! Jeder Handler ist fuer eine Gruppe von Nachrichtentypen zustaendig
//! und hat Zugriff auf den gemeinsamen VermittlungsState.

pub mod anruf_handler;
pub mod auth_handler;
pub mod relay_handler;
