use thiserror::Error;

/// Fehler im Signaling-Kern.
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

pub type SignalingResult<T> = Result<T, SignalingError>;
