//! fluester-chat – Nachrichten-Service
//!
//! Dieses Crate implementiert die Geschaeftslogik des Nachrichten-Versands:
//! Mitgliedschafts-Pruefung, Eingabe-Validierung, Persistenz und das
//! anschliessende angereicherte Re-Read. Die Zustellung an verbundene
//! Clients (Fanout) liegt im Signaling-Crate.

pub mod error;
pub mod service;

// Bequeme Re-Exporte
pub use error::{ChatError, ChatResult};
pub use service::NachrichtenService;
