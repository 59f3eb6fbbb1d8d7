//! TCP-Accept-Schleife des Signaling-Servers.

use std::net::SocketAddr;
use std::sync::Arc;

use fluester_auth::SessionPruefer;
use fluester_db::ChatRepository;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::LocalSet;
use tracing::{info, warn};

use crate::connection::ClientVerbindung;
use crate::error::SignalingResult;
use crate::server_state::SignalingState;

/// Nimmt TCP-Verbindungen an und startet pro Verbindung einen Task.
pub struct SignalingServer<R, S>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    state: Arc<SignalingState<R, S>>,
}

impl<R, S> SignalingServer<R, S>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    pub fn neu(state: Arc<SignalingState<R, S>>) -> Self {
        Self { state }
    }

    /// Accept-Schleife; laeuft bis das Shutdown-Signal kommt.
    ///
    /// Verbindungs-Tasks werden auf einem `LocalSet` gestartet, weil die
    /// Handler-Futures keine Send-Garantie tragen.
    pub async fn starten(
        self,
        adresse: SocketAddr,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> SignalingResult<()> {
        let listener = TcpListener::bind(adresse).await?;
        info!(%adresse, "Signaling-Server lauscht");

        let lokal = LocalSet::new();
        lokal
            .run_until(async move {
                loop {
                    tokio::select! {
                        eingehend = listener.accept() => {
                            match eingehend {
                                Ok((stream, peer)) => self.verbindung_starten(stream, peer, shutdown_rx.clone()),
                                Err(fehler) => {
                                    warn!(%fehler, "Accept fehlgeschlagen");
                                }
                            }
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                info!("Shutdown-Signal empfangen, Accept-Schleife endet");
                                break;
                            }
                        }
                    }
                }
            })
            .await;

        Ok(())
    }

    fn verbindung_starten(
        &self,
        stream: tokio::net::TcpStream,
        peer: SocketAddr,
        shutdown_rx: watch::Receiver<bool>,
    ) {
        if self.state.register.online_anzahl() >= self.state.config.max_clients {
            warn!(%peer, max = self.state.config.max_clients, "Client-Limit erreicht, Verbindung abgewiesen");
            drop(stream);
            return;
        }
        if let Err(fehler) = stream.set_nodelay(true) {
            warn!(%peer, %fehler, "TCP_NODELAY nicht setzbar");
        }

        let verbindung = ClientVerbindung::neu(Arc::clone(&self.state), peer.to_string());
        tokio::task::spawn_local(verbindung.verarbeiten(stream, shutdown_rx));
    }
}
