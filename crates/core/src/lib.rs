//! fluester-core – Gemeinsame Typen fuer Fluester
//!
//! Dieses Crate definiert die ID-Newtypes, die von allen anderen Crates
//! geteilt werden. Es hat keine Abhaengigkeit auf Netzwerk- oder
//! Datenbank-Code; Fehlertypen leben in den jeweiligen Fach-Crates.

pub mod types;

// Bequeme Re-Exporte
pub use types::{ChatId, MessageId, UserId, VerbindungsId};
