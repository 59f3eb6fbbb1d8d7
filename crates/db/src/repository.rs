//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt den Echtzeit-Kern von der konkreten
//! Datenbank-Implementierung. Der Kern sieht genau die Operationen, die er
//! an der Speichergrenze braucht: Mitgliedschaft pruefen, Nachricht anhaengen,
//! angereicherte Zeile erneut lesen, Mitgliederliste und Nachrichtenzahl.
//!
//! Die Traits verwenden `async fn` ohne Send-Garantie (async_fn_in_trait);
//! alle Verbindungs-Tasks laufen deshalb in einer `tokio::task::LocalSet`.

use fluester_core::types::{ChatId, MessageId, UserId};

use crate::error::DbResult;
use crate::models::{NachrichtMitAbsender, NeueNachricht};

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://fluester.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://fluester.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Repository fuer Chat-Mitgliedschaften und Nachrichten
///
/// Der Echtzeit-Kern liest Mitgliedschaften nur (sie werden vom
/// ausgelagerten REST-Pfad verwaltet) und haengt Nachrichten an.
#[allow(async_fn_in_trait)]
pub trait ChatRepository: Send + Sync {
    /// Prueft ob ein Benutzer Mitglied eines Chats ist
    async fn ist_mitglied(&self, chat_id: ChatId, user_id: UserId) -> DbResult<bool>;

    /// Gibt alle Mitglieder eines Chats zurueck
    async fn mitglieder(&self, chat_id: ChatId) -> DbResult<Vec<UserId>>;

    /// Fuegt eine neue Nachricht ein und gibt ihre ID zurueck
    async fn nachricht_einfuegen(&self, daten: NeueNachricht<'_>) -> DbResult<MessageId>;

    /// Liest eine persistierte Nachricht angereichert mit Absender-Daten
    async fn nachricht_mit_absender(
        &self,
        id: MessageId,
    ) -> DbResult<Option<NachrichtMitAbsender>>;

    /// Zaehlt die persistierten Nachrichten eines Chats
    async fn nachrichten_zaehlen(&self, chat_id: ChatId) -> DbResult<i64>;
}
