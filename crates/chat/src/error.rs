//! Fehlertypen fuer das Chat-Crate

use thiserror::Error;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Kein Mitglied dieses Chats")]
    KeinMitglied,

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("Datenbank-Fehler: {0}")]
    DatenbankFehler(#[from] fluester_db::DbError),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

pub type ChatResult<T> = Result<T, ChatError>;
