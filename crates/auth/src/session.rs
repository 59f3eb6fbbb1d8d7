//! Session-Pruefung und In-Memory-Session-Store
//!
//! Sessions werden im Speicher gehalten (HashMap mit TTL). Ein
//! Hintergrund-Task bereinigt abgelaufene Sessions automatisch.
//! Der Echtzeit-Kern konsumiert nur den `SessionPruefer`-Trait; der
//! ausgelagerte Login-Pfad legt Sessions via `erstellen` ab.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::RngCore;
use tokio::sync::RwLock;

use fluester_core::types::UserId;

use crate::error::{AuthError, AuthResult};

/// Standard-Session-Lebensdauer: 24 Stunden
const SESSION_TTL_SEKUNDEN: i64 = 24 * 60 * 60;

/// Intervall fuer den automatischen Cleanup-Task: 15 Minuten
const CLEANUP_INTERVALL: Duration = Duration::from_secs(15 * 60);

// ---------------------------------------------------------------------------
// Identitaet & Session
// ---------------------------------------------------------------------------

/// Die Identitaet, die eine erfolgreiche Token-Pruefung liefert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenutzerIdentitaet {
    pub user_id: UserId,
    pub username: String,
    pub email: String,
}

/// Ein aktives Session-Token
#[derive(Debug, Clone)]
pub struct Session {
    /// Der Token-String (URL-sicheres Base64)
    pub token: String,
    /// Identitaet des Benutzers dem diese Session gehoert
    pub identitaet: BenutzerIdentitaet,
    /// Zeitpunkt der Session-Erstellung
    pub erstellt_am: DateTime<Utc>,
    /// Zeitpunkt des Session-Ablaufs
    pub laeuft_ab_am: DateTime<Utc>,
}

impl Session {
    /// Gibt `true` zurueck wenn die Session noch gueltig ist
    pub fn ist_gueltig(&self) -> bool {
        Utc::now() < self.laeuft_ab_am
    }
}

// ---------------------------------------------------------------------------
// SessionPruefer-Trait
// ---------------------------------------------------------------------------

/// Prueft ein opakes Credential und gibt die Benutzer-Identitaet zurueck
///
/// Der Echtzeit-Kern kennt nur diese Schnittstelle; wer die Tokens
/// ausstellt (Login-Pfad, externer Auth-Dienst) bleibt austauschbar.
#[allow(async_fn_in_trait)]
pub trait SessionPruefer: Send + Sync {
    /// Validiert einen Token; Fehler bei unbekanntem oder abgelaufenem Token
    async fn pruefen(&self, token: &str) -> AuthResult<BenutzerIdentitaet>;
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// In-Memory Session-Store mit TTL-Unterstuetzung
#[derive(Debug, Default)]
pub struct SessionStore {
    /// token -> Session
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    /// Erstellt einen neuen leeren Session-Store
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Erstellt einen neuen Session-Store und startet den Cleanup-Task
    pub fn neu_mit_cleanup(store: Arc<Self>) -> Arc<Self> {
        let store_klon = Arc::clone(&store);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(CLEANUP_INTERVALL).await;
                let entfernt = store_klon.cleanup_abgelaufene().await;
                if entfernt > 0 {
                    tracing::debug!(anzahl = entfernt, "Abgelaufene Sessions bereinigt");
                }
            }
        });
        store
    }

    /// Erstellt eine neue Session fuer die angegebene Identitaet
    ///
    /// Gibt die vollstaendige Session mit generiertem Token zurueck.
    pub async fn erstellen(&self, identitaet: BenutzerIdentitaet) -> Session {
        let token = token_generieren();
        let jetzt = Utc::now();
        let session = Session {
            token: token.clone(),
            identitaet,
            erstellt_am: jetzt,
            laeuft_ab_am: jetzt + chrono::Duration::seconds(SESSION_TTL_SEKUNDEN),
        };

        self.sessions.write().await.insert(token, session.clone());
        tracing::debug!(user_id = %session.identitaet.user_id, "Neue Session erstellt");
        session
    }

    /// Invalidiert (loescht) eine Session anhand des Tokens
    pub async fn invalidieren(&self, token: &str) {
        self.sessions.write().await.remove(token);
        tracing::debug!("Session invalidiert");
    }

    /// Bereinigt abgelaufene Sessions und gibt die Anzahl der entfernten zurueck
    pub async fn cleanup_abgelaufene(&self) -> usize {
        let jetzt = Utc::now();
        let mut sessions = self.sessions.write().await;
        let vorher = sessions.len();
        sessions.retain(|_, s| s.laeuft_ab_am > jetzt);
        vorher - sessions.len()
    }

    /// Gibt die Anzahl der aktiven (nicht abgelaufenen) Sessions zurueck
    pub async fn anzahl_aktive(&self) -> usize {
        let jetzt = Utc::now();
        let sessions = self.sessions.read().await;
        sessions.values().filter(|s| s.laeuft_ab_am > jetzt).count()
    }
}

impl SessionPruefer for SessionStore {
    async fn pruefen(&self, token: &str) -> AuthResult<BenutzerIdentitaet> {
        let sessions = self.sessions.read().await;
        match sessions.get(token) {
            None => Err(AuthError::SessionUngueltig),
            Some(session) if !session.ist_gueltig() => Err(AuthError::SessionAbgelaufen),
            Some(session) => Ok(session.identitaet.clone()),
        }
    }
}

/// Generiert einen kryptografisch sicheren Session-Token (URL-sicheres Base64)
fn token_generieren() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identitaet(name: &str) -> BenutzerIdentitaet {
        BenutzerIdentitaet {
            user_id: UserId::new(),
            username: name.to_string(),
            email: format!("{name}@example.org"),
        }
    }

    #[tokio::test]
    async fn session_erstellen_und_pruefen() {
        let store = SessionStore::neu();
        let identitaet = test_identitaet("anna");

        let session = store.erstellen(identitaet.clone()).await;
        assert!(session.ist_gueltig());

        let geprueft = store.pruefen(&session.token).await.expect("Pruefung");
        assert_eq!(geprueft, identitaet);
    }

    #[tokio::test]
    async fn ungueltiger_token_gibt_fehler() {
        let store = SessionStore::neu();
        let ergebnis = store.pruefen("kein_gueltiger_token").await;
        assert!(matches!(ergebnis, Err(AuthError::SessionUngueltig)));
    }

    #[tokio::test]
    async fn session_invalidieren() {
        let store = SessionStore::neu();
        let session = store.erstellen(test_identitaet("ben")).await;

        store.invalidieren(&session.token).await;
        let ergebnis = store.pruefen(&session.token).await;
        assert!(matches!(ergebnis, Err(AuthError::SessionUngueltig)));
    }

    #[tokio::test]
    async fn token_sind_eindeutig() {
        let store = SessionStore::neu();
        let s1 = store.erstellen(test_identitaet("anna")).await;
        let s2 = store.erstellen(test_identitaet("anna")).await;
        assert_ne!(s1.token, s2.token, "Session-Tokens muessen eindeutig sein");
    }

    #[tokio::test]
    async fn cleanup_entfernt_nur_abgelaufene() {
        let store = SessionStore::neu();
        let _aktiv = store.erstellen(test_identitaet("anna")).await;

        // Abgelaufene Session von Hand einfuegen
        let abgelaufen = Session {
            token: "alt".into(),
            identitaet: test_identitaet("ben"),
            erstellt_am: Utc::now() - chrono::Duration::hours(48),
            laeuft_ab_am: Utc::now() - chrono::Duration::hours(24),
        };
        store.sessions.write().await.insert("alt".into(), abgelaufen);

        let entfernt = store.cleanup_abgelaufene().await;
        assert_eq!(entfernt, 1);
        assert_eq!(store.anzahl_aktive().await, 1);
    }
}
