//! Event-Dispatcher: nimmt dekodierte Client-Events entgegen und leitet
//! sie an die zustaendigen Handler weiter.
//!
//! Der Dispatcher wird von der Verbindungs-Schleife pro Frame aufgerufen
//! und vollstaendig abgewartet, bevor der naechste Frame gelesen wird.
//! Damit bleibt die Reihenfolge der Events einer Verbindung erhalten.

use std::sync::Arc;

use fluester_auth::SessionPruefer;
use fluester_core::{UserId, VerbindungsId};
use fluester_db::ChatRepository;
use fluester_protocol::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::handlers::{auth_handler, call_handler, chat_handler};
use crate::registry::{leerer_anruf_slot, AnrufSlot};
use crate::server_state::SignalingState;

/// Lebenszyklus einer Verbindung.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    Unauthentifiziert,
    Authentifiziert,
    Geschlossen,
}

/// Zustand einer einzelnen Verbindung, lebt in deren Task.
pub struct VerbindungsKontext {
    pub verbindungs_id: VerbindungsId,
    pub zustand: VerbindungsZustand,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub device_id: Option<String>,
    /// Handle auf die Sende-Queue der eigenen Verbindung; wird bei der
    /// Authentifizierung ins Register eingetragen.
    pub sende_tx: mpsc::Sender<ServerEvent>,
    /// Laufender Anruf dieser Verbindung, geteilt mit dem Register.
    pub anruf: AnrufSlot,
}

impl VerbindungsKontext {
    pub fn neu(sende_tx: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            verbindungs_id: VerbindungsId::new(),
            zustand: VerbindungsZustand::Unauthentifiziert,
            user_id: None,
            username: None,
            device_id: None,
            sende_tx,
            anruf: leerer_anruf_slot(),
        }
    }

    pub fn ist_authentifiziert(&self) -> bool {
        self.zustand == VerbindungsZustand::Authentifiziert
    }
}

/// Verteilt Client-Events an die Handler.
pub struct EventDispatcher<R, S>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    state: Arc<SignalingState<R, S>>,
}

impl<R, S> EventDispatcher<R, S>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    pub fn neu(state: Arc<SignalingState<R, S>>) -> Self {
        Self { state }
    }

    /// Verarbeitet ein Event und liefert, falls noetig, eine direkte
    /// Antwort an den Absender. Zustellungen an andere Benutzer laufen
    /// ueber das Register.
    pub async fn dispatch(
        &self,
        event: ClientEvent,
        ctx: &mut VerbindungsKontext,
    ) -> Option<ServerEvent> {
        match event {
            ClientEvent::Unbekannt => {
                trace!(verbindung = %ctx.verbindungs_id, "Unbekanntes Event ignoriert");
                None
            }
            ClientEvent::Authenticate { token, device_id } => {
                if ctx.ist_authentifiziert() {
                    return Some(ServerEvent::fehler("Bereits authentifiziert"));
                }
                auth_handler::handle_authenticate(&token, device_id, ctx, &self.state).await
            }
            ereignis => {
                // Vor der Authentifizierung wird alles ausser `authenticate`
                // kommentarlos verworfen.
                let Some(user_id) = ctx.user_id else {
                    debug!(
                        verbindung = %ctx.verbindungs_id,
                        typ = ereignis.typ_name(),
                        "Event vor Authentifizierung verworfen"
                    );
                    return None;
                };
                self.authentifiziertes_event(ereignis, user_id, ctx).await
            }
        }
    }

    async fn authentifiziertes_event(
        &self,
        event: ClientEvent,
        user_id: UserId,
        ctx: &mut VerbindungsKontext,
    ) -> Option<ServerEvent> {
        match event {
            ClientEvent::Message { chat_id, content } => {
                chat_handler::handle_message(chat_id, &content, user_id, &self.state).await
            }
            ClientEvent::Typing {
                chat_id,
                user_id: angezeigte_id,
                username,
            } => {
                chat_handler::handle_typing(chat_id, angezeigte_id, username, user_id, &self.state)
                    .await
            }
            ClientEvent::CallOffer {
                chat_id,
                target_id,
                offer,
                caller_data,
            } => {
                call_handler::handle_call_offer(
                    chat_id,
                    target_id,
                    offer,
                    caller_data,
                    user_id,
                    ctx,
                    &self.state,
                )
                .await
            }
            ClientEvent::CallAnswer {
                chat_id,
                target_id,
                answer,
            } => {
                call_handler::handle_call_answer(chat_id, target_id, answer, user_id, &self.state)
            }
            ClientEvent::CallIceCandidate {
                chat_id,
                target_id,
                candidate,
            } => call_handler::handle_call_ice_candidate(
                chat_id,
                target_id,
                candidate,
                user_id,
                &self.state,
            ),
            ClientEvent::CallEnd {
                chat_id,
                target_id,
                reason,
            } => call_handler::handle_call_end(chat_id, target_id, reason, user_id, ctx, &self.state),
            ClientEvent::CallError {
                chat_id,
                target_id,
                error,
            } => call_handler::handle_call_error(chat_id, target_id, error, user_id, ctx, &self.state),
            // Bereits im aeusseren Match behandelt.
            ClientEvent::Authenticate { .. } | ClientEvent::Unbekannt => None,
        }
    }

    /// Abschluss-Arbeiten beim Trennen einer Verbindung: laufenden Anruf
    /// der Gegenseite melden und den Register-Eintrag entfernen, sofern
    /// er noch dieser Verbindung gehoert.
    pub async fn verbindung_schliessen(&self, ctx: &mut VerbindungsKontext) {
        ctx.zustand = VerbindungsZustand::Geschlossen;
        let Some(user_id) = ctx.user_id else {
            return;
        };

        let laufender_anruf = ctx.anruf.lock().take();
        if let Some(anruf) = laufender_anruf {
            call_handler::anruf_bei_trennung_beenden(user_id, &anruf, &self.state);
        }

        let entfernt = self.state.register.abmelden(&user_id, ctx.verbindungs_id);
        debug!(
            user_id = %user_id,
            verbindung = %ctx.verbindungs_id,
            entfernt,
            "Verbindung geschlossen"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
