//! Geteilter Zustand des Signaling-Servers.

use std::sync::Arc;

use fluester_auth::SessionPruefer;
use fluester_chat::NachrichtenService;
use fluester_db::ChatRepository;

use crate::registry::VerbindungsRegister;

/// Laufzeit-Konfiguration des Signaling-Kerns.
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale Anzahl gleichzeitig angemeldeter Clients.
    pub max_clients: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self { max_clients: 512 }
    }
}

/// Alles, was Verbindungs-Tasks und Handler teilen.
pub struct SignalingState<R, S>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    pub config: SignalingConfig,
    pub session_pruefer: Arc<S>,
    pub nachrichten: Arc<NachrichtenService<R>>,
    pub register: VerbindungsRegister,
}

impl<R, S> SignalingState<R, S>
where
    R: ChatRepository + 'static,
    S: SessionPruefer + 'static,
{
    pub fn neu(
        config: SignalingConfig,
        session_pruefer: Arc<S>,
        nachrichten: Arc<NachrichtenService<R>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            session_pruefer,
            nachrichten,
            register: VerbindungsRegister::neu(),
        })
    }
}
