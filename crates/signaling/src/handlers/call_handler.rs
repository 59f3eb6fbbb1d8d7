//! Relay fuer die Anruf-Signalisierung (WebRTC-Handshake).
//!
//! Der Server interpretiert SDP- und ICE-Payloads nicht, er reicht sie nur
//! zwischen den beiden Verbindungen durch. Gehalten wird lediglich der
//! `AnrufKontext` pro Verbindung, damit bei einem Verbindungsabbruch die
//! Gegenseite ein `call_end` erhaelt.

use fluester_auth::SessionPruefer;
use fluester_core::{ChatId, UserId};
use fluester_db::ChatRepository;
use fluester_protocol::ServerEvent;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::dispatcher::VerbindungsKontext;
use crate::registry::{AnrufKontext, AnrufRolle};
use crate::server_state::SignalingState;

/// Startet einen Anruf: prueft Mitgliedschaft und Erreichbarkeit, setzt den
/// Anruf-Zustand auf beiden Verbindungen und leitet das Angebot weiter.
pub async fn handle_call_offer<R, S>(
    chat_id: ChatId,
    target_id: UserId,
    offer: Value,
    caller_data: Value,
    sender_id: UserId,
    ctx: &mut VerbindungsKontext,
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
        warn!(%chat_id, user_id = %sender_id, "Anruf von Nicht-Mitglied abgelehnt");
        return Some(ServerEvent::anruf_fehler(
            chat_id,
            target_id,
            "Kein Mitglied dieses Chats",
        ));
    }

    let Some(ziel) = state.register.suchen(&target_id) else {
        debug!(%chat_id, target_id = %target_id, "Anruf-Ziel ist offline");
        return Some(ServerEvent::anruf_fehler(chat_id, target_id, "user offline"));
    };

    // Der Angerufene braucht die Anrufer-ID, um antworten zu koennen.
    let caller_data = mit_anrufer_id(caller_data, sender_id);

    let zugestellt = ziel.senden(ServerEvent::CallOffer {
        chat_id,
        offer,
        caller_data,
    });
    if !zugestellt {
        return Some(ServerEvent::anruf_fehler(chat_id, target_id, "user offline"));
    }

    *ctx.anruf.lock() = Some(AnrufKontext {
        chat_id,
        peer_user_id: target_id,
        rolle: AnrufRolle::Anrufer,
    });
    *ziel.anruf.lock() = Some(AnrufKontext {
        chat_id,
        peer_user_id: sender_id,
        rolle: AnrufRolle::Angerufener,
    });

    info!(%chat_id, anrufer = %sender_id, angerufener = %target_id, "Anruf vermittelt");
    Some(ServerEvent::CallOfferSent { chat_id, target_id })
}

/// Leitet die Antwort des Angerufenen an den Anrufer weiter. Ist der
/// Anrufer inzwischen offline, wird das Event verworfen; der laufende
/// Handshake scheitert dann ohnehin an ICE-Timeouts.
pub fn handle_call_answer<R, S>(
    chat_id: ChatId,
    target_id: UserId,
    answer: Value,
    sender_id: UserId,
    state: &SignalingState<R, S>,
) -> Option<ServerEvent>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    let zugestellt = state.register.an_user_senden(
        &target_id,
        ServerEvent::CallAnswer {
            chat_id,
            answer,
            target_id: sender_id,
        },
    );
    if !zugestellt {
        debug!(%chat_id, target_id = %target_id, "call_answer verworfen, Ziel offline");
    }
    None
}

/// Leitet ICE-Kandidaten weiter; Offline-Ziele werden still ignoriert.
pub fn handle_call_ice_candidate<R, S>(
    chat_id: ChatId,
    target_id: UserId,
    candidate: Value,
    sender_id: UserId,
    state: &SignalingState<R, S>,
) -> Option<ServerEvent>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    state.register.an_user_senden(
        &target_id,
        ServerEvent::CallIceCandidate {
            chat_id,
            candidate,
            sender_id,
        },
    );
    None
}

/// Beendet einen Anruf: Weiterleitung an die Gegenseite und Anruf-Zustand
/// auf beiden Verbindungen leeren.
pub fn handle_call_end<R, S>(
    chat_id: ChatId,
    target_id: UserId,
    reason: Option<String>,
    sender_id: UserId,
    ctx: &mut VerbindungsKontext,
    state: &SignalingState<R, S>,
) -> Option<ServerEvent>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    state.register.an_user_senden(
        &target_id,
        ServerEvent::CallEnd {
            chat_id,
            reason,
            sender_id,
        },
    );
    anruf_zustand_leeren(ctx, target_id, state);
    info!(%chat_id, von = %sender_id, an = %target_id, "Anruf beendet");
    None
}

/// Meldet einen clientseitigen Anruf-Fehler an die Gegenseite und beendet
/// den Anruf-Zustand wie `call_end`.
pub fn handle_call_error<R, S>(
    chat_id: ChatId,
    target_id: UserId,
    error: Value,
    sender_id: UserId,
    ctx: &mut VerbindungsKontext,
    state: &SignalingState<R, S>,
) -> Option<ServerEvent>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    state.register.an_user_senden(
        &target_id,
        ServerEvent::CallError {
            chat_id,
            error,
            sender_id,
        },
    );
    anruf_zustand_leeren(ctx, target_id, state);
    None
}

/// Trennt sich eine Verbindung mitten im Anruf, erhaelt die Gegenseite ein
/// synthetisches `call_end` und ihr Anruf-Zustand wird geleert.
pub fn anruf_bei_trennung_beenden<R, S>(
    user_id: UserId,
    anruf: &AnrufKontext,
    state: &SignalingState<R, S>,
)
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    info!(
        chat_id = %anruf.chat_id,
        user_id = %user_id,
        peer = %anruf.peer_user_id,
        "Anrufteilnehmer getrennt, Gegenseite wird informiert"
    );
    state.register.an_user_senden(
        &anruf.peer_user_id,
        ServerEvent::CallEnd {
            chat_id: anruf.chat_id,
            reason: Some("user_disconnected".into()),
            sender_id: user_id,
        },
    );
    peer_anruf_leeren(anruf.peer_user_id, user_id, state);
}

fn anruf_zustand_leeren<R, S>(
    ctx: &mut VerbindungsKontext,
    target_id: UserId,
    state: &SignalingState<R, S>,
)
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    ctx.anruf.lock().take();
    if let Some(user_id) = ctx.user_id {
        peer_anruf_leeren(target_id, user_id, state);
    }
}

/// Leert den Anruf-Slot des Peers, aber nur wenn er noch auf den
/// angegebenen Benutzer zeigt. Ein bereits neu angenommener Anruf des
/// Peers bleibt unberuehrt.
fn peer_anruf_leeren<R, S>(peer_id: UserId, erwarteter_peer: UserId, state: &SignalingState<R, S>)
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    let Some(peer) = state.register.suchen(&peer_id) else {
        return;
    };
    let mut slot = peer.anruf.lock();
    if slot
        .as_ref()
        .is_some_and(|anruf| anruf.peer_user_id == erwarteter_peer)
    {
        slot.take();
    }
}

fn mit_anrufer_id(caller_data: Value, sender_id: UserId) -> Value {
    match caller_data {
        Value::Object(mut map) => {
            map.insert("callerId".into(), json!(sender_id));
            Value::Object(map)
        }
        Value::Null => json!({ "callerId": sender_id }),
        // Nicht-Objekt-Payloads bleiben unangetastet.
        andere => andere,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
