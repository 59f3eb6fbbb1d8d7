//! Authentifizierung einer frischen Verbindung.

use fluester_auth::SessionPruefer;
use fluester_db::ChatRepository;
use fluester_protocol::{BenutzerDarstellung, ServerEvent};
use tracing::{info, warn};

use crate::dispatcher::{VerbindungsKontext, VerbindungsZustand};
use crate::server_state::SignalingState;

/// Prueft das Token und traegt die Verbindung bei Erfolg ins Register ein.
///
/// Ein fehlgeschlagenes `authenticate` beendet die Verbindung nicht; der
/// Client darf es mit einem anderen Token erneut versuchen.
pub async fn handle_authenticate<R, S>(
    token: &str,
    device_id: Option<String>,
    ctx: &mut VerbindungsKontext,
    state: &SignalingState<R, S>,
) -> Option<ServerEvent>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    let identitaet = match state.session_pruefer.pruefen(token).await {
        Ok(identitaet) => identitaet,
        Err(fehler) => {
            warn!(verbindung = %ctx.verbindungs_id, %fehler, "Authentifizierung fehlgeschlagen");
            return Some(ServerEvent::AuthError {
                message: fehler.to_string(),
            });
        }
    };

    ctx.zustand = VerbindungsZustand::Authentifiziert;
    ctx.user_id = Some(identitaet.user_id);
    ctx.username = Some(identitaet.username.clone());
    ctx.device_id = device_id;

    // Ab jetzt erreichen Fanout und Anruf-Relay diese Verbindung. Eine
    // eventuell bestehende Verbindung desselben Benutzers wird verdraengt.
    state.register.registrieren(
        identitaet.user_id,
        ctx.verbindungs_id,
        ctx.sende_tx.clone(),
        ctx.anruf.clone(),
    );

    info!(
        user_id = %identitaet.user_id,
        username = %identitaet.username,
        device_id = ctx.device_id.as_deref().unwrap_or("-"),
        "Client authentifiziert"
    );

    Some(ServerEvent::Authenticated {
        user: BenutzerDarstellung {
            id: identitaet.user_id,
            username: identitaet.username,
            email: identitaet.email,
        },
    })
}
