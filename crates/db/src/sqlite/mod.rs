//! SQLite-Backend-Implementierung der Repository-Traits

pub mod chats;
pub mod pool;

pub use pool::SqliteDb;
