//! Verbindungs-Register: die zentrale Zuordnung User-ID -> aktive Verbindung.
//!
//! Pro Benutzer gibt es hoechstens einen Eintrag. Meldet sich derselbe
//! Benutzer erneut an (zweites Geraet, Reconnect nach Netzwechsel), ersetzt
//! die neue Verbindung den alten Eintrag kommentarlos. Die verdraengte
//! Verbindung bleibt auf TCP-Ebene offen, erhaelt aber keine Events mehr
//! und raeumt beim Trennen nichts Fremdes ab, weil `abmelden` die
//! Verbindungs-ID vergleicht.

use std::sync::Arc;

use dashmap::DashMap;
use fluester_core::{ChatId, UserId, VerbindungsId};
use fluester_protocol::ServerEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Kapazitaet der Sende-Queue pro Verbindung. Laeuft sie voll, ist der
/// Client zu langsam und das Event wird verworfen.
pub const SENDE_QUEUE_GROESSE: usize = 64;

/// Rolle in einem laufenden Anruf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnrufRolle {
    Anrufer,
    Angerufener,
}

/// Zustand eines laufenden Anrufs, gebunden an eine Verbindung.
#[derive(Debug, Clone)]
pub struct AnrufKontext {
    pub chat_id: ChatId,
    pub peer_user_id: UserId,
    pub rolle: AnrufRolle,
}

/// Geteilter Anruf-Slot einer Verbindung. Der Relay-Pfad der Gegenseite
/// muss den Slot setzen und leeren koennen, daher Arc<Mutex<...>>.
pub type AnrufSlot = Arc<Mutex<Option<AnrufKontext>>>;

pub fn leerer_anruf_slot() -> AnrufSlot {
    Arc::new(Mutex::new(None))
}

/// Handle auf eine registrierte Verbindung.
#[derive(Clone)]
pub struct ClientSender {
    pub verbindungs_id: VerbindungsId,
    pub user_id: UserId,
    tx: mpsc::Sender<ServerEvent>,
    pub anruf: AnrufSlot,
}

impl ClientSender {
    /// Stellt ein Event in die Sende-Queue der Verbindung. Best-effort:
    /// bei voller Queue oder geschlossener Verbindung wird das Event
    /// verworfen und `false` zurueckgegeben.
    pub fn senden(&self, event: ServerEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(user_id = %self.user_id, "Sende-Queue voll, Event verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(user_id = %self.user_id, "Sende-Queue geschlossen, Event verworfen");
                false
            }
        }
    }
}

/// Register aller authentifizierten Verbindungen.
#[derive(Clone, Default)]
pub struct VerbindungsRegister {
    clients: Arc<DashMap<UserId, ClientSender>>,
}

impl VerbindungsRegister {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Traegt eine Verbindung fuer einen Benutzer ein. Ein bestehender
    /// Eintrag wird ersetzt; die alte Verbindung wird nicht benachrichtigt.
    pub fn registrieren(
        &self,
        user_id: UserId,
        verbindungs_id: VerbindungsId,
        tx: mpsc::Sender<ServerEvent>,
        anruf: AnrufSlot,
    ) {
        let vorher = self.clients.insert(
            user_id,
            ClientSender {
                verbindungs_id,
                user_id,
                tx,
                anruf,
            },
        );
        if let Some(alt) = vorher {
            debug!(
                user_id = %user_id,
                alt = %alt.verbindungs_id,
                neu = %verbindungs_id,
                "Bestehende Verbindung ersetzt"
            );
        } else {
            trace!(user_id = %user_id, verbindung = %verbindungs_id, "Verbindung registriert");
        }
    }

    /// Entfernt den Eintrag eines Benutzers, aber nur wenn er noch zur
    /// angegebenen Verbindung gehoert. So raeumt eine verdraengte alte
    /// Verbindung beim Trennen nicht den Eintrag ihres Nachfolgers ab.
    pub fn abmelden(&self, user_id: &UserId, verbindungs_id: VerbindungsId) -> bool {
        let entfernt = self
            .clients
            .remove_if(user_id, |_, client| client.verbindungs_id == verbindungs_id)
            .is_some();
        if entfernt {
            trace!(user_id = %user_id, verbindung = %verbindungs_id, "Verbindung abgemeldet");
        }
        entfernt
    }

    /// O(1)-Lookup der aktiven Verbindung eines Benutzers.
    pub fn suchen(&self, user_id: &UserId) -> Option<ClientSender> {
        self.clients.get(user_id).map(|eintrag| eintrag.value().clone())
    }

    pub fn ist_online(&self, user_id: &UserId) -> bool {
        self.clients.contains_key(user_id)
    }

    /// Sendet ein Event an einen Benutzer, falls er online ist.
    pub fn an_user_senden(&self, user_id: &UserId, event: ServerEvent) -> bool {
        match self.suchen(user_id) {
            Some(client) => client.senden(event),
            None => false,
        }
    }

    pub fn online_anzahl(&self) -> usize {
        self.clients.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fluester_protocol::ServerEvent;

    fn verbinden(register: &VerbindungsRegister, user_id: UserId) -> (VerbindungsId, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(SENDE_QUEUE_GROESSE);
        let verbindungs_id = VerbindungsId::new();
        register.registrieren(user_id, verbindungs_id, tx, leerer_anruf_slot());
        (verbindungs_id, rx)
    }

    #[tokio::test]
    async fn registrieren_und_senden() {
        let register = VerbindungsRegister::neu();
        let user = UserId::new();
        let (_, mut rx) = verbinden(&register, user);

        assert!(register.ist_online(&user));
        assert!(register.an_user_senden(&user, ServerEvent::fehler("hallo")));
        assert!(matches!(rx.recv().await, Some(ServerEvent::Error { .. })));
    }

    #[tokio::test]
    async fn neue_verbindung_ersetzt_alte() {
        let register = VerbindungsRegister::neu();
        let user = UserId::new();
        let (_, mut alt_rx) = verbinden(&register, user);
        let (_, mut neu_rx) = verbinden(&register, user);

        assert_eq!(register.online_anzahl(), 1);
        assert!(register.an_user_senden(&user, ServerEvent::fehler("test")));

        // Nur die neue Verbindung erhaelt das Event.
        assert!(neu_rx.recv().await.is_some());
        assert!(alt_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn abmelden_mit_fremder_verbindungs_id_ist_noop() {
        let register = VerbindungsRegister::neu();
        let user = UserId::new();
        let (alte_id, _alt_rx) = verbinden(&register, user);
        let (_neue_id, _neu_rx) = verbinden(&register, user);

        // Die verdraengte Verbindung darf den neuen Eintrag nicht entfernen.
        assert!(!register.abmelden(&user, alte_id));
        assert!(register.ist_online(&user));
    }

    #[tokio::test]
    async fn abmelden_entfernt_eigenen_eintrag() {
        let register = VerbindungsRegister::neu();
        let user = UserId::new();
        let (verbindungs_id, _rx) = verbinden(&register, user);

        assert!(register.abmelden(&user, verbindungs_id));
        assert!(!register.ist_online(&user));
        assert!(!register.an_user_senden(&user, ServerEvent::fehler("weg")));
    }

    #[tokio::test]
    async fn senden_an_offline_user_schlaegt_fehl() {
        let register = VerbindungsRegister::neu();
        assert!(!register.an_user_senden(&UserId::new(), ServerEvent::fehler("niemand")));
    }

    #[tokio::test]
    async fn volle_queue_verwirft_event() {
        let register = VerbindungsRegister::neu();
        let user = UserId::new();
        let (tx, _rx) = mpsc::channel(1);
        register.registrieren(user, VerbindungsId::new(), tx, leerer_anruf_slot());

        assert!(register.an_user_senden(&user, ServerEvent::fehler("eins")));
        assert!(!register.an_user_senden(&user, ServerEvent::fehler("zwei")));
    }
}
