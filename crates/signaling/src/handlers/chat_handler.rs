//! Nachrichten-Fanout und Tipp-Indikatoren.

use fluester_auth::SessionPruefer;
use fluester_chat::ChatError;
use fluester_core::{ChatId, UserId};
use fluester_db::{ChatRepository, NachrichtMitAbsender, NachrichtenArt};
use fluester_protocol::{NachrichtDarstellung, ServerEvent};
use tracing::{debug, error, info};

use crate::server_state::SignalingState;

/// Persistiert eine Text-Nachricht und verteilt sie an alle Online-Mitglieder.
///
/// Schlaegt Validierung oder Persistenz fehl, erhaelt nur der Absender einen
/// Fehler; es wird nichts verteilt.
pub async fn handle_message<R, S>(
    chat_id: ChatId,
    content: &str,
    sender_id: UserId,
    state: &SignalingState<R, S>,
) -> Option<ServerEvent>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    match state
        .nachrichten
        .nachricht_senden(chat_id, sender_id, NachrichtenArt::Text, content)
        .await
    {
        Ok((nachricht, erste)) => {
            nachricht_verteilen(state, &nachricht, erste).await;
            None
        }
        Err(ChatError::KeinMitglied) => {
            debug!(%chat_id, user_id = %sender_id, "Nachricht von Nicht-Mitglied abgelehnt");
            Some(ServerEvent::fehler("Kein Mitglied dieses Chats"))
        }
        Err(ChatError::UngueltigeEingabe(grund)) => Some(ServerEvent::fehler(grund)),
        Err(fehler) => {
            error!(%chat_id, %fehler, "Nachricht konnte nicht gespeichert werden");
            Some(ServerEvent::fehler("Nachricht konnte nicht gespeichert werden"))
        }
    }
}

/// Verteilt eine bereits persistierte Nachricht an alle Online-Mitglieder
/// des Chats, den Absender eingeschlossen. Gibt die Anzahl der erreichten
/// Verbindungen zurueck.
///
/// Auch der Upload-Pfad (Sprachnachrichten, Dateien) nutzt diese Funktion,
/// nachdem er die Nachricht ueber den `NachrichtenService` abgelegt hat.
pub async fn nachricht_verteilen<R, S>(
    state: &SignalingState<R, S>,
    nachricht: &NachrichtMitAbsender,
    erste_nachricht: bool,
) -> usize
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    let mitglieder = match state.nachrichten.mitglieder(nachricht.chat_id).await {
        Ok(mitglieder) => mitglieder,
        Err(fehler) => {
            error!(chat_id = %nachricht.chat_id, %fehler, "Mitgliederliste nicht lesbar, Fanout uebersprungen");
            return 0;
        }
    };

    let darstellung = als_darstellung(nachricht);
    let mut erreicht = 0;
    for mitglied in mitglieder {
        let Some(client) = state.register.suchen(&mitglied) else {
            continue;
        };
        if client.senden(ServerEvent::NewMessage {
            message: darstellung.clone(),
        }) {
            erreicht += 1;
        }
        // Die erste Nachricht macht den Chat fuer beide Seiten sichtbar.
        if erste_nachricht {
            client.senden(ServerEvent::ChatCreated {
                chat_id: nachricht.chat_id,
            });
        }
    }

    info!(
        chat_id = %nachricht.chat_id,
        message_id = %nachricht.id,
        erreicht,
        "Nachricht verteilt"
    );
    erreicht
}

/// Leitet einen Tipp-Indikator an alle anderen Online-Mitglieder weiter.
/// Wird nicht persistiert.
pub async fn handle_typing<R, S>(
    chat_id: ChatId,
    angezeigte_id: UserId,
    username: String,
    sender_id: UserId,
    state: &SignalingState<R, S>,
) -> Option<ServerEvent>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    if state
        .nachrichten
        .mitgliedschaft_pruefen(chat_id, sender_id)
        .await
        .is_err()
    {
        debug!(%chat_id, user_id = %sender_id, "Tipp-Indikator von Nicht-Mitglied abgelehnt");
        return Some(ServerEvent::fehler("Kein Mitglied dieses Chats"));
    }

    let mitglieder = match state.nachrichten.mitglieder(chat_id).await {
        Ok(mitglieder) => mitglieder,
        Err(fehler) => {
            error!(%chat_id, %fehler, "Mitgliederliste nicht lesbar");
            return None;
        }
    };

    for mitglied in mitglieder {
        if mitglied == sender_id {
            continue;
        }
        state.register.an_user_senden(
            &mitglied,
            ServerEvent::Typing {
                chat_id,
                user_id: angezeigte_id,
                username: username.clone(),
            },
        );
    }
    None
}

fn als_darstellung(nachricht: &NachrichtMitAbsender) -> NachrichtDarstellung {
    NachrichtDarstellung {
        id: nachricht.id,
        chat_id: nachricht.chat_id,
        user_id: nachricht.user_id,
        kind: nachricht.kind.als_str().to_string(),
        content: nachricht.content.clone(),
        created_at: nachricht.created_at,
        username: nachricht.username.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
