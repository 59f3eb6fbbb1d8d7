//! fluester-protocol – Protokoll-Definitionen fuer Fluester
//!
//! Definiert das Event-Envelope (JSON-Objekt mit `type`-Diskriminator) fuer
//! beide Richtungen sowie das Frame-Format der TCP-Verbindung
//! (u32-Laengenpraefix + JSON-Payload).

pub mod events;
pub mod wire;

// Bequeme Re-Exporte
pub use events::{
    BenutzerDarstellung, ClientEvent, NachrichtDarstellung, ServerEvent,
};
pub use wire::FrameCodec;
