//! fluester-auth – Session-Pruefung fuer Fluester
//!
//! Der Echtzeit-Kern authentifiziert Verbindungen ueber ein opakes
//! Credential (Session-Token). Die Ausgabe von Credentials (Passwort-Login,
//! Registrierung) gehoert dem ausgelagerten HTTP-Pfad; dieser Crate stellt
//! nur die Pruef-Schnittstelle (`SessionPruefer`) und einen In-Memory-Store
//! mit TTL bereit, in den der Login-Pfad Sessions ablegt.

pub mod error;
pub mod session;

// Bequeme Re-Exporte
pub use error::{AuthError, AuthResult};
pub use session::{BenutzerIdentitaet, Session, SessionPruefer, SessionStore};
