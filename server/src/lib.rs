//! fluester-server – Bibliotheks-Root
//!
//! Verdrahtet die Crates zum lauffaehigen Messenger-Server: Datenbank,
//! Session-Store, Nachrichten-Service und den Signaling-Kern.

pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use fluester_auth::SessionStore;
use fluester_chat::NachrichtenService;
use fluester_db::{DatabaseConfig, SqliteDb};
use fluester_signaling::{SignalingConfig, SignalingServer, SignalingState};
use tokio::sync::watch;

use config::ServerConfig;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Datenbankverbindung herstellen, Schema anlegen
    /// 2. Session-Store mit Cleanup-Task starten
    /// 3. TCP-Listener des Signaling-Kerns starten
    /// 4. Auf Ctrl-C warten und den Kern geordnet beenden
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %self.config.tcp_bind_adresse(),
            "Server startet"
        );

        let db_config = DatabaseConfig {
            url: self.config.datenbank.url.clone(),
            max_verbindungen: self.config.datenbank.max_verbindungen,
            sqlite_wal: self.config.datenbank.wal,
        };
        let db = SqliteDb::oeffnen(&db_config)
            .await
            .context("Datenbankverbindung fehlgeschlagen")?;
        db.schema_anlegen()
            .await
            .context("Schema konnte nicht angelegt werden")?;
        tracing::info!(url = %db_config.url, "Datenbank bereit");

        let sessions = SessionStore::neu_mit_cleanup(SessionStore::neu());
        let nachrichten = NachrichtenService::neu(Arc::new(db));

        let state = SignalingState::neu(
            SignalingConfig {
                max_clients: self.config.server.max_clients,
            },
            sessions,
            nachrichten,
        );

        let adresse: SocketAddr = self
            .config
            .tcp_bind_adresse()
            .parse()
            .context("Ungueltige Bind-Adresse")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if let Err(fehler) = tokio::signal::ctrl_c().await {
                tracing::error!(%fehler, "Ctrl-C-Handler fehlgeschlagen");
                return;
            }
            tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            let _ = shutdown_tx.send(true);
        });

        SignalingServer::neu(state)
            .starten(adresse, shutdown_rx)
            .await
            .context("Signaling-Server beendet mit Fehler")?;

        tracing::info!("Server beendet");
        Ok(())
    }
}
