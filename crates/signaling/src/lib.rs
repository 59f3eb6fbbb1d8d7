//! Fluester Signaling: der Echtzeit-Kern des Messengers.
//!
//! Drei Aufgaben, ein Prozess:
//! - **Verbindungs-Register**: pro Benutzer hoechstens eine aktive
//!   Verbindung, O(1)-Lookup fuer alle Zustell-Pfade.
//! - **Nachrichten-Fanout**: Chat-Nachrichten validieren, persistieren und
//!   an alle Online-Mitglieder verteilen.
//! - **Anruf-Relay**: WebRTC-Signalisierung (Offer/Answer/ICE) zwischen
//!   zwei Verbindungen durchreichen, ohne die Payloads zu interpretieren.
//!
//! Der Kern haelt keinen Chat-Zustand selbst; Wahrheit ueber Mitgliedschaft
//! und Nachrichten liegt in `fluester-db`, Sessions prueft `fluester-auth`.

pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod server_state;
pub mod tcp;

pub use connection::ClientVerbindung;
pub use dispatcher::{EventDispatcher, VerbindungsKontext, VerbindungsZustand};
pub use error::{SignalingError, SignalingResult};
pub use registry::{AnrufKontext, AnrufRolle, ClientSender, VerbindungsRegister};
pub use server_state::{SignalingConfig, SignalingState};
pub use tcp::SignalingServer;

// ---------------------------------------------------------------------------
// Test-Hilfen
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testhilfe {
    use std::sync::Arc;
    use std::time::Duration;

    use fluester_auth::{BenutzerIdentitaet, SessionStore};
    use fluester_chat::NachrichtenService;
    use fluester_core::{ChatId, UserId};
    use fluester_db::SqliteDb;
    use fluester_protocol::{NachrichtDarstellung, ServerEvent};
    use serde_json::Value;
    use tokio::sync::mpsc;

    use crate::dispatcher::{VerbindungsKontext, VerbindungsZustand};
    use crate::registry::SENDE_QUEUE_GROESSE;
    use crate::server_state::{SignalingConfig, SignalingState};

    pub(crate) type TestState = Arc<SignalingState<SqliteDb, SessionStore>>;

    /// Frischer Signaling-Zustand mit In-Memory-Datenbank.
    pub(crate) async fn test_state() -> TestState {
        let db = Arc::new(SqliteDb::in_memory().await.expect("In-Memory-Datenbank"));
        let sessions = SessionStore::neu();
        let nachrichten = NachrichtenService::neu(db);
        SignalingState::neu(SignalingConfig::default(), sessions, nachrichten)
    }

    impl SignalingState<SqliteDb, SessionStore> {
        /// Legt einen Chat mit den angegebenen Mitgliedern an.
        pub(crate) async fn testchat_anlegen(&self, mitglieder: &[UserId]) -> ChatId {
            let chat_id = ChatId::new();
            let repo = self.nachrichten.repo();
            repo.chat_anlegen(chat_id).await.expect("Chat anlegen");
            for mitglied in mitglieder {
                repo.mitglied_hinzufuegen(chat_id, *mitglied)
                    .await
                    .expect("Mitglied hinzufuegen");
            }
            chat_id
        }
    }

    /// Angelegter Benutzer mit gueltiger Session.
    pub(crate) struct TestClient {
        pub user_id: UserId,
        pub username: String,
        pub token: String,
    }

    impl TestClient {
        pub(crate) async fn anlegen(state: &TestState, name: &str) -> Self {
            let user_id = UserId::new();
            let email = format!("{name}@example.org");
            state
                .nachrichten
                .repo()
                .benutzer_anlegen(user_id, name, &email)
                .await
                .expect("Benutzer anlegen");
            let session = state
                .session_pruefer
                .erstellen(BenutzerIdentitaet {
                    user_id,
                    username: name.to_string(),
                    email,
                })
                .await;
            Self {
                user_id,
                username: name.to_string(),
                token: session.token,
            }
        }

        /// Simuliert eine bereits authentifizierte Verbindung: Kontext plus
        /// Register-Eintrag, die Empfangsseite der Sende-Queue geht an den
        /// Test zurueck.
        pub(crate) fn verbinden(&self, state: &TestState) -> TestVerbindung {
            let (tx, rx) = mpsc::channel(SENDE_QUEUE_GROESSE);
            let mut ctx = VerbindungsKontext::neu(tx.clone());
            ctx.zustand = VerbindungsZustand::Authentifiziert;
            ctx.user_id = Some(self.user_id);
            ctx.username = Some(self.username.clone());
            state
                .register
                .registrieren(self.user_id, ctx.verbindungs_id, tx, ctx.anruf.clone());
            TestVerbindung { ctx, rx }
        }
    }

    /// Kontext und Empfangsqueue einer simulierten Verbindung.
    pub(crate) struct TestVerbindung {
        pub ctx: VerbindungsKontext,
        pub rx: mpsc::Receiver<ServerEvent>,
    }

    impl TestVerbindung {
        async fn naechstes_event(&mut self) -> ServerEvent {
            tokio::time::timeout(Duration::from_secs(1), self.rx.recv())
                .await
                .expect("Timeout beim Warten auf Event")
                .expect("Queue geschlossen")
        }

        pub(crate) async fn erwarte_new_message(&mut self) -> NachrichtDarstellung {
            match self.naechstes_event().await {
                ServerEvent::NewMessage { message } => message,
                andere => panic!("new_message erwartet, erhalten: {andere:?}"),
            }
        }

        pub(crate) async fn erwarte_chat_created(&mut self) -> ChatId {
            match self.naechstes_event().await {
                ServerEvent::ChatCreated { chat_id } => chat_id,
                andere => panic!("chat_created erwartet, erhalten: {andere:?}"),
            }
        }

        pub(crate) async fn erwarte_call_offer(&mut self) -> (Value, Value) {
            match self.naechstes_event().await {
                ServerEvent::CallOffer {
                    offer, caller_data, ..
                } => (offer, caller_data),
                andere => panic!("call_offer erwartet, erhalten: {andere:?}"),
            }
        }

        pub(crate) async fn erwarte_call_end(&mut self) -> (Option<String>, UserId) {
            match self.naechstes_event().await {
                ServerEvent::CallEnd {
                    reason, sender_id, ..
                } => (reason, sender_id),
                andere => panic!("call_end erwartet, erhalten: {andere:?}"),
            }
        }
    }
}
