//! fluester-db – Datenbank-Abstraktion
//!
//! Dieses Crate stellt das Repository-Pattern bereit: der Echtzeit-Kern
//! konsumiert ausschliesslich die Trait-Schnittstelle (`ChatRepository`),
//! die konkrete SQLite-Implementierung haengt dahinter. Der Kern mutiert
//! Mitgliedschaften nie – er fragt sie nur ab und haengt Nachrichten an.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

// Bequeme Re-Exporte
pub use error::{DbError, DbResult};
pub use models::{NachrichtMitAbsender, NachrichtenArt, NeueNachricht};
pub use repository::{ChatRepository, DatabaseConfig};
pub use sqlite::SqliteDb;
