//! NachrichtenService – Validierung, Persistenz und Re-Read

use std::sync::Arc;

use fluester_core::types::{ChatId, UserId};
use fluester_db::{
    models::{NachrichtMitAbsender, NachrichtenArt, NeueNachricht},
    ChatRepository,
};

use crate::error::{ChatError, ChatResult};

/// Maximale Nachrichtenlaenge in Zeichen
const MAX_NACHRICHT_ZEICHEN: usize = 4096;

/// NachrichtenService verwaltet den Versandpfad einer Chat-Nachricht
///
/// Der Service prueft, persistiert und liest erneut – er stellt NICHT zu.
/// Das Fanout an verbundene Clients geschieht im Signaling-Crate ueber
/// die hier zurueckgegebene angereicherte Zeile.
pub struct NachrichtenService<R: ChatRepository> {
    repo: Arc<R>,
}

impl<R: ChatRepository> NachrichtenService<R> {
    /// Erstellt einen neuen NachrichtenService
    pub fn neu(repo: Arc<R>) -> Arc<Self> {
        Arc::new(Self { repo })
    }

    /// Zugriff auf das unterliegende Repository.
    pub fn repo(&self) -> &Arc<R> {
        &self.repo
    }

    /// Nachricht in einem Chat senden
    ///
    /// Ablauf:
    /// 1. Mitgliedschafts-Pruefung (Absender muss Chat-Mitglied sein)
    /// 2. Eingabe-Validierung (nicht leer, Laengen-Limit)
    /// 3. Persistenz; ein Fehler bricht ab – kein Retry, kein Teil-Broadcast
    /// 4. Re-Read der persistierten Zeile mit Absender-Anzeigedaten, damit
    ///    alle Empfaenger die kanonische ID und den Server-Zeitstempel sehen
    ///
    /// Gibt die angereicherte Zeile zurueck sowie `true` wenn dies die
    /// allererste Nachricht des Chats war (chat_created-Signal).
    pub async fn nachricht_senden(
        &self,
        chat_id: ChatId,
        sender_id: UserId,
        art: NachrichtenArt,
        content: &str,
    ) -> ChatResult<(NachrichtMitAbsender, bool)> {
        self.mitgliedschaft_pruefen(chat_id, sender_id).await?;

        if content.trim().is_empty() {
            return Err(ChatError::UngueltigeEingabe(
                "Nachrichteninhalt darf nicht leer sein".into(),
            ));
        }

        if content.chars().count() > MAX_NACHRICHT_ZEICHEN {
            return Err(ChatError::UngueltigeEingabe(format!(
                "Nachricht zu lang: {} Zeichen (Maximum: {})",
                content.chars().count(),
                MAX_NACHRICHT_ZEICHEN
            )));
        }

        let id = self
            .repo
            .nachricht_einfuegen(NeueNachricht {
                chat_id,
                sender_id,
                art,
                content,
            })
            .await?;

        // Erkennung der allerersten Nachricht: Zaehlung NACH dem Insert
        let erste = self.repo.nachrichten_zaehlen(chat_id).await? == 1;

        let nachricht = self
            .repo
            .nachricht_mit_absender(id)
            .await?
            .ok_or_else(|| {
                ChatError::Intern(format!("Nachricht {id} nach Insert nicht lesbar"))
            })?;

        tracing::debug!(
            message_id = %nachricht.id,
            chat_id = %chat_id,
            sender_id = %sender_id,
            erste_nachricht = erste,
            "Nachricht persistiert"
        );

        Ok((nachricht, erste))
    }

    /// Prueft ob ein Benutzer Mitglied des Chats ist
    ///
    /// Gemeinsames Tor fuer Nachrichten-, Typing- und Anruf-Pfade.
    pub async fn mitgliedschaft_pruefen(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> ChatResult<()> {
        if self.repo.ist_mitglied(chat_id, user_id).await? {
            Ok(())
        } else {
            Err(ChatError::KeinMitglied)
        }
    }

    /// Gibt die Mitgliederliste eines Chats zurueck
    pub async fn mitglieder(&self, chat_id: ChatId) -> ChatResult<Vec<UserId>> {
        Ok(self.repo.mitglieder(chat_id).await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fluester_db::SqliteDb;

    async fn test_service() -> (Arc<NachrichtenService<SqliteDb>>, ChatId, UserId, UserId) {
        let db = Arc::new(SqliteDb::in_memory().await.unwrap());
        let chat = ChatId::new();
        let anna = UserId::new();
        let ben = UserId::new();

        db.benutzer_anlegen(anna, "anna", "anna@example.org").await.unwrap();
        db.benutzer_anlegen(ben, "ben", "ben@example.org").await.unwrap();
        db.chat_anlegen(chat).await.unwrap();
        db.mitglied_hinzufuegen(chat, anna).await.unwrap();
        db.mitglied_hinzufuegen(chat, ben).await.unwrap();

        (NachrichtenService::neu(db), chat, anna, ben)
    }

    #[tokio::test]
    async fn senden_liefert_angereicherte_zeile() {
        let (service, chat, anna, _) = test_service().await;

        let (nachricht, erste) = service
            .nachricht_senden(chat, anna, NachrichtenArt::Text, "hallo")
            .await
            .unwrap();

        assert!(erste, "Erste Nachricht muss als solche erkannt werden");
        assert_eq!(nachricht.chat_id, chat);
        assert_eq!(nachricht.user_id, anna);
        assert_eq!(nachricht.content, "hallo");
        assert_eq!(nachricht.username, "anna");
    }

    #[tokio::test]
    async fn zweite_nachricht_ist_nicht_erste() {
        let (service, chat, anna, ben) = test_service().await;

        let (_, erste) = service
            .nachricht_senden(chat, anna, NachrichtenArt::Text, "eins")
            .await
            .unwrap();
        assert!(erste);

        let (_, erste) = service
            .nachricht_senden(chat, ben, NachrichtenArt::Text, "zwei")
            .await
            .unwrap();
        assert!(!erste);
    }

    #[tokio::test]
    async fn nicht_mitglied_wird_abgelehnt() {
        let (service, chat, _, _) = test_service().await;
        let fremder = UserId::new();

        let ergebnis = service
            .nachricht_senden(chat, fremder, NachrichtenArt::Text, "hi")
            .await;
        assert!(matches!(ergebnis, Err(ChatError::KeinMitglied)));
    }

    #[tokio::test]
    async fn leere_nachricht_wird_abgelehnt() {
        let (service, chat, anna, _) = test_service().await;

        let ergebnis = service
            .nachricht_senden(chat, anna, NachrichtenArt::Text, "   ")
            .await;
        assert!(matches!(ergebnis, Err(ChatError::UngueltigeEingabe(_))));
    }

    #[tokio::test]
    async fn zu_lange_nachricht_wird_abgelehnt() {
        let (service, chat, anna, _) = test_service().await;
        let lang = "x".repeat(MAX_NACHRICHT_ZEICHEN + 1);

        let ergebnis = service
            .nachricht_senden(chat, anna, NachrichtenArt::Text, &lang)
            .await;
        assert!(matches!(ergebnis, Err(ChatError::UngueltigeEingabe(_))));
    }

    #[tokio::test]
    async fn mitgliedschaft_tor() {
        let (service, chat, anna, _) = test_service().await;
        assert!(service.mitgliedschaft_pruefen(chat, anna).await.is_ok());
        assert!(matches!(
            service.mitgliedschaft_pruefen(chat, UserId::new()).await,
            Err(ChatError::KeinMitglied)
        ));
    }
}
