//! SQLite-Implementierung des ChatRepository

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use fluester_core::types::{ChatId, MessageId, UserId};

use crate::error::{DbError, DbResult};
use crate::models::{NachrichtMitAbsender, NachrichtenArt, NeueNachricht};
use crate::repository::ChatRepository;
use crate::sqlite::pool::SqliteDb;

/// Zeitstempel-Format in der Datenbank (RFC3339-kompatibel, Sekunden-genau
/// plus Subsekunden, damit die Einfuege-Reihenfolge sortierbar bleibt)
const ZEIT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

impl ChatRepository for SqliteDb {
    async fn ist_mitglied(&self, chat_id: ChatId, user_id: UserId) -> DbResult<bool> {
        let row = sqlx::query(
            "SELECT 1 FROM chat_members WHERE chat_id = ? AND user_id = ?",
        )
        .bind(chat_id.inner().to_string())
        .bind(user_id.inner().to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn mitglieder(&self, chat_id: ChatId) -> DbResult<Vec<UserId>> {
        let rows = sqlx::query("SELECT user_id FROM chat_members WHERE chat_id = ?")
            .bind(chat_id.inner().to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| {
                let s: String = r.get("user_id");
                Uuid::parse_str(&s)
                    .map(UserId)
                    .map_err(|e| DbError::UngueltigeDaten(format!("user_id '{s}': {e}")))
            })
            .collect()
    }

    async fn nachricht_einfuegen(&self, daten: NeueNachricht<'_>) -> DbResult<MessageId> {
        let id = MessageId::new();
        let now_str = Utc::now().format(ZEIT_FORMAT).to_string();

        sqlx::query(
            "INSERT INTO messages (id, chat_id, sender_id, kind, content, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.inner().to_string())
        .bind(daten.chat_id.inner().to_string())
        .bind(daten.sender_id.inner().to_string())
        .bind(daten.art.als_str())
        .bind(daten.content)
        .bind(&now_str)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn nachricht_mit_absender(
        &self,
        id: MessageId,
    ) -> DbResult<Option<NachrichtMitAbsender>> {
        let row = sqlx::query(
            "SELECT m.id, m.chat_id, m.sender_id, m.kind, m.content, m.created_at,
                    u.username
             FROM messages m
             JOIN users u ON u.id = m.sender_id
             WHERE m.id = ?",
        )
        .bind(id.inner().to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_zu_nachricht(&r)).transpose()
    }

    async fn nachrichten_zaehlen(&self, chat_id: ChatId) -> DbResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS anzahl FROM messages WHERE chat_id = ?")
            .bind(chat_id.inner().to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("anzahl"))
    }
}

// ---------------------------------------------------------------------------
// Verwaltungs-Hilfen
// ---------------------------------------------------------------------------

/// Schreiboperationen die dem ausgelagerten Persistenz-Dienst gehoeren.
/// Sie existieren hier, damit Integrationstests und der Server-Bootstrap
/// Benutzer und Chats anlegen koennen.
impl SqliteDb {
    /// Legt einen Benutzer an
    pub async fn benutzer_anlegen(
        &self,
        id: UserId,
        username: &str,
        email: &str,
    ) -> DbResult<()> {
        sqlx::query("INSERT INTO users (id, username, email, created_at) VALUES (?, ?, ?, ?)")
            .bind(id.inner().to_string())
            .bind(username)
            .bind(email)
            .bind(Utc::now().format(ZEIT_FORMAT).to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Legt einen Chat an
    pub async fn chat_anlegen(&self, id: ChatId) -> DbResult<()> {
        sqlx::query("INSERT INTO chats (id, created_at) VALUES (?, ?)")
            .bind(id.inner().to_string())
            .bind(Utc::now().format(ZEIT_FORMAT).to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Fuegt einen Benutzer als Chat-Mitglied hinzu
    pub async fn mitglied_hinzufuegen(&self, chat_id: ChatId, user_id: UserId) -> DbResult<()> {
        sqlx::query("INSERT INTO chat_members (chat_id, user_id) VALUES (?, ?)")
            .bind(chat_id.inner().to_string())
            .bind(user_id.inner().to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Zeilen-Konvertierung
// ---------------------------------------------------------------------------

fn row_zu_nachricht(row: &sqlx::sqlite::SqliteRow) -> DbResult<NachrichtMitAbsender> {
    let id_str: String = row.get("id");
    let chat_str: String = row.get("chat_id");
    let sender_str: String = row.get("sender_id");
    let kind_str: String = row.get("kind");
    let created_str: String = row.get("created_at");

    Ok(NachrichtMitAbsender {
        id: MessageId(uuid_parsen(&id_str, "id")?),
        chat_id: ChatId(uuid_parsen(&chat_str, "chat_id")?),
        user_id: UserId(uuid_parsen(&sender_str, "sender_id")?),
        kind: NachrichtenArt::from_str(&kind_str).map_err(DbError::UngueltigeDaten)?,
        content: row.get("content"),
        created_at: zeit_parsen(&created_str)?,
        username: row.get("username"),
    })
}

fn uuid_parsen(s: &str, feld: &str) -> DbResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DbError::UngueltigeDaten(format!("{feld} '{s}': {e}")))
}

fn zeit_parsen(s: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::UngueltigeDaten(format!("created_at '{s}': {e}")))
}
