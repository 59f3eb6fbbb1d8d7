//! Lebenszyklus einer einzelnen Client-Verbindung.
//!
//! Jede Verbindung laeuft in einem eigenen Task: Frames lesen, ein Event
//! nach dem anderen vollstaendig verarbeiten, ausgehende Events aus der
//! Sende-Queue schreiben. Weil `dispatch` vor dem naechsten Frame
//! abgewartet wird, bleibt die Event-Reihenfolge pro Verbindung erhalten.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use fluester_auth::SessionPruefer;
use fluester_db::ChatRepository;
use fluester_protocol::FrameCodec;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use crate::dispatcher::{EventDispatcher, VerbindungsKontext};
use crate::registry::SENDE_QUEUE_GROESSE;
use crate::server_state::SignalingState;

/// Eine aktive Client-Verbindung.
pub struct ClientVerbindung<R, S>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    state: Arc<SignalingState<R, S>>,
    peer: String,
}

impl<R, S> ClientVerbindung<R, S>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    pub fn neu(state: Arc<SignalingState<R, S>>, peer: String) -> Self {
        Self { state, peer }
    }

    /// Treibt die Verbindung bis zum Trennen. Laeuft bis der Client die
    /// Verbindung schliesst, ein Framing-Fehler auftritt oder der Server
    /// herunterfaehrt.
    pub async fn verarbeiten<T>(self, stream: T, mut shutdown_rx: watch::Receiver<bool>)
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = Framed::new(stream, FrameCodec::new());
        let (sende_tx, mut sende_rx) = mpsc::channel(SENDE_QUEUE_GROESSE);
        let mut ctx = VerbindungsKontext::neu(sende_tx);
        let dispatcher = EventDispatcher::neu(Arc::clone(&self.state));

        debug!(peer = %self.peer, verbindung = %ctx.verbindungs_id, "Verbindung angenommen");

        loop {
            tokio::select! {
                frame = framed.next() => {
                    match frame {
                        Some(Ok(event)) => {
                            trace!(verbindung = %ctx.verbindungs_id, typ = event.typ_name(), "Frame empfangen");
                            if let Some(antwort) = dispatcher.dispatch(event, &mut ctx).await {
                                if let Err(fehler) = framed.send(antwort).await {
                                    warn!(peer = %self.peer, %fehler, "Antwort nicht zustellbar");
                                    break;
                                }
                            }
                        }
                        Some(Err(fehler)) => {
                            // Framing-Verstoesse (z.B. ueberlange Frames)
                            // beenden die Verbindung; kaputte JSON-Payloads
                            // kommen hier nie an, die dekodiert der Codec zu
                            // einem ignorierbaren Event.
                            warn!(peer = %self.peer, %fehler, "Framing-Fehler, Verbindung wird getrennt");
                            break;
                        }
                        None => {
                            debug!(peer = %self.peer, "Client hat die Verbindung geschlossen");
                            break;
                        }
                    }
                }
                ausgehend = sende_rx.recv() => {
                    // Der Sender lebt in `ctx`, der Kanal schliesst also nie
                    // vor dem Task-Ende.
                    if let Some(event) = ausgehend {
                        if let Err(fehler) = framed.send(event).await {
                            warn!(peer = %self.peer, %fehler, "Event nicht zustellbar");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        debug!(peer = %self.peer, "Server faehrt herunter, Verbindung wird geschlossen");
                        break;
                    }
                }
            }
        }

        dispatcher.verbindung_schliessen(&mut ctx).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testhilfe::{test_state, TestClient};
    use bytes::BytesMut;
    use fluester_protocol::{ClientEvent, ServerEvent};
    use tokio_util::codec::{Decoder, Encoder};

    fn kodieren(event: &ClientEvent) -> Vec<u8> {
        let json = serde_json::to_vec(event).expect("Serialisierung");
        let mut frame = (json.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(&json);
        frame
    }

    fn dekodieren(puffer: &mut BytesMut) -> Option<ServerEvent> {
        // Server-Frames haben dasselbe Format; hier manuell zerlegt.
        if puffer.len() < 4 {
            return None;
        }
        let laenge = u32::from_be_bytes([puffer[0], puffer[1], puffer[2], puffer[3]]) as usize;
        if puffer.len() < 4 + laenge {
            return None;
        }
        let _ = puffer.split_to(4);
        let payload = puffer.split_to(laenge);
        Some(serde_json::from_slice(&payload).expect("Server-Event"))
    }

    #[tokio::test]
    async fn authentifizierung_ueber_die_leitung() {
        let state = test_state().await;
        let anna = TestClient::anlegen(&state, "anna").await;

        let (client_seite, server_seite) = tokio::io::duplex(64 * 1024);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let lokal = tokio::task::LocalSet::new();
        lokal
            .run_until(async {
                use tokio::io::{AsyncReadExt, AsyncWriteExt};

                let verbindung = ClientVerbindung::neu(state.clone(), "test".into());
                let task =
                    tokio::task::spawn_local(verbindung.verarbeiten(server_seite, shutdown_rx));
                let mut client = client_seite;

                client
                    .write_all(&kodieren(&ClientEvent::Authenticate {
                        token: anna.token.clone(),
                        device_id: None,
                    }))
                    .await
                    .expect("Frame schreiben");

                let mut puffer = BytesMut::new();
                let antwort = loop {
                    if let Some(event) = dekodieren(&mut puffer) {
                        break event;
                    }
                    let mut chunk = [0u8; 1024];
                    let gelesen = client.read(&mut chunk).await.expect("lesen");
                    puffer.extend_from_slice(&chunk[..gelesen]);
                };

                match antwort {
                    ServerEvent::Authenticated { user } => {
                        assert_eq!(user.id, anna.user_id);
                        assert_eq!(user.username, "anna");
                    }
                    andere => panic!("authenticated erwartet, erhalten: {andere:?}"),
                }
                assert!(state.register.ist_online(&anna.user_id));

                shutdown_tx.send(true).expect("Shutdown-Signal");
                let _ = task.await;
            })
            .await;
    }

    #[tokio::test]
    async fn codec_roundtrip_fuer_client_events() {
        // Absicherung, dass die Test-Hilfen oben dasselbe Format sprechen
        // wie der echte Codec.
        let mut codec = FrameCodec::new();
        let mut puffer = BytesMut::from(
            &kodieren(&ClientEvent::Authenticate {
                token: "t".into(),
                device_id: None,
            })[..],
        );
        let event = codec.decode(&mut puffer).expect("decode").expect("Frame");
        assert!(matches!(event, ClientEvent::Authenticate { .. }));

        let mut ausgabe = BytesMut::new();
        codec
            .encode(ServerEvent::fehler("x"), &mut ausgabe)
            .expect("encode");
        assert!(dekodieren(&mut ausgabe).is_some());
    }
}
