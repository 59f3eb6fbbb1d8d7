//! Fehlertypen fuer die Session-Pruefung

use thiserror::Error;

/// Alle moeglichen Fehler bei der Session-Pruefung
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Session nicht gefunden oder abgelaufen")]
    SessionUngueltig,

    #[error("Session abgelaufen")]
    SessionAbgelaufen,

    #[error("Interner Auth-Fehler: {0}")]
    Intern(String),
}

pub type AuthResult<T> = Result<T, AuthError>;
