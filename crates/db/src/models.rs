//! Datenbankmodelle fuer Fluester
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank.
//! Sie sind von den Protokoll-Typen getrennt und dienen als reine
//! Datenuebertragungsobjekte.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fluester_core::types::{ChatId, MessageId, UserId};

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

/// Art einer Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NachrichtenArt {
    Text,
    Voice,
    File,
}

impl NachrichtenArt {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
            Self::File => "file",
        }
    }
}

impl std::str::FromStr for NachrichtenArt {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "voice" => Ok(Self::Voice),
            "file" => Ok(Self::File),
            other => Err(format!("Unbekannte Nachrichten-Art: {other}")),
        }
    }
}

/// Daten zum Einfuegen einer neuen Nachricht
#[derive(Debug, Clone)]
pub struct NeueNachricht<'a> {
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub art: NachrichtenArt,
    pub content: &'a str,
}

/// Persistierte Nachricht, beim erneuten Lesen mit dem Anzeigenamen des
/// Absenders angereichert
///
/// Die Zustellung verwendet immer diese Zeile statt der eingegangenen
/// Payload, damit jeder Empfaenger die kanonische Server-ID und den
/// Server-Zeitstempel sieht.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NachrichtMitAbsender {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub kind: NachrichtenArt,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
}
