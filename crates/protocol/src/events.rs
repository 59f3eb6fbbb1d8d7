//! Event-Envelope fuer die Echtzeit-Verbindung
//!
//! Beide Richtungen verwenden ein einzelnes JSON-Objekt mit einem
//! verpflichtenden `type`-Diskriminator. Unbekannte Felder werden ignoriert,
//! fehlende Pflichtfelder fuehren zum Verwerfen des Events.
//!
//! ## Design
//! - Intern getaggte Enums (`#[serde(tag = "type")]`) fuer typsichere Events
//! - Event-Felder auf dem Draht in camelCase (`chatId`, `targetId`, ...)
//! - SDP-/ICE-Payloads (`offer`, `answer`, `candidate`, `callerData`) sind
//!   opake `serde_json::Value` – der Server interpretiert sie nie
//! - Unbekannte `type`-Werte dekodieren zur `Unbekannt`-Variante und werden
//!   vom Dispatcher ignoriert (Vorwaertskompatibilitaet)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fluester_core::types::{ChatId, MessageId, UserId};

// ---------------------------------------------------------------------------
// Darstellungs-Typen
// ---------------------------------------------------------------------------

/// Benutzer-Darstellung in der `authenticated`-Antwort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenutzerDarstellung {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

/// Persistierte Nachricht, angereichert mit Absender-Anzeigedaten
///
/// Wird nach dem Einfuegen erneut aus der Datenbank gelesen, damit alle
/// Empfaenger dieselbe kanonische ID und denselben Server-Zeitstempel sehen.
/// Die Feldnamen entsprechen den Spalten der Datenbankzeile (snake_case).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NachrichtDarstellung {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub kind: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
}

// ---------------------------------------------------------------------------
// Eingehende Events (Client -> Server)
// ---------------------------------------------------------------------------

/// Alle Events die ein Client senden kann
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Handshake: opakes Credential + optionale Geraete-Kennung
    Authenticate {
        token: String,
        #[serde(default)]
        device_id: Option<String>,
    },

    /// Text-Nachricht in einen Chat senden
    Message { chat_id: ChatId, content: String },

    /// Tipp-Indikator (best-effort, keine Persistenz)
    Typing {
        chat_id: ChatId,
        user_id: UserId,
        username: String,
    },

    /// Anruf-Angebot an einen Ziel-Benutzer
    CallOffer {
        chat_id: ChatId,
        target_id: UserId,
        offer: Value,
        #[serde(default)]
        caller_data: Value,
    },

    /// Antwort des Angerufenen auf ein Angebot
    CallAnswer {
        chat_id: ChatId,
        target_id: UserId,
        answer: Value,
    },

    /// ICE-Kandidat fuer die laufende Verhandlung
    CallIceCandidate {
        chat_id: ChatId,
        target_id: UserId,
        candidate: Value,
    },

    /// Anruf beenden
    CallEnd {
        chat_id: ChatId,
        target_id: UserId,
        #[serde(default)]
        reason: Option<String>,
    },

    /// Anruf-Fehler an die Gegenseite melden
    CallError {
        chat_id: ChatId,
        target_id: UserId,
        error: Value,
    },

    /// Unbekannter oder nicht parsebarer Event-Typ – wird ignoriert
    #[serde(other)]
    Unbekannt,
}

impl ClientEvent {
    /// Kurzer Name des Event-Typs fuer Log-Ausgaben
    pub fn typ_name(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::Message { .. } => "message",
            Self::Typing { .. } => "typing",
            Self::CallOffer { .. } => "call_offer",
            Self::CallAnswer { .. } => "call_answer",
            Self::CallIceCandidate { .. } => "call_ice_candidate",
            Self::CallEnd { .. } => "call_end",
            Self::CallError { .. } => "call_error",
            Self::Unbekannt => "unbekannt",
        }
    }
}

// ---------------------------------------------------------------------------
// Ausgehende Events (Server -> Client)
// ---------------------------------------------------------------------------

/// Alle Events die der Server an Clients sendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Handshake erfolgreich
    Authenticated { user: BenutzerDarstellung },

    /// Handshake fehlgeschlagen – Verbindung bleibt offen
    AuthError { message: String },

    /// Neue persistierte Nachricht
    NewMessage { message: NachrichtDarstellung },

    /// Einmaliges Signal: erste Nachricht dieses Chats wurde persistiert
    ChatCreated { chat_id: ChatId },

    /// Tipp-Indikator eines anderen Chat-Mitglieds
    Typing {
        chat_id: ChatId,
        user_id: UserId,
        username: String,
    },

    /// Eingehendes Anruf-Angebot
    CallOffer {
        chat_id: ChatId,
        offer: Value,
        caller_data: Value,
    },

    /// Bestaetigung an den Anrufer: Angebot wurde zugestellt
    CallOfferSent { chat_id: ChatId, target_id: UserId },

    /// Antwort des Angerufenen, weitergeleitet an den Anrufer
    CallAnswer {
        chat_id: ChatId,
        answer: Value,
        target_id: UserId,
    },

    /// ICE-Kandidat der Gegenseite
    CallIceCandidate {
        chat_id: ChatId,
        candidate: Value,
        sender_id: UserId,
    },

    /// Anruf wurde beendet
    CallEnd {
        chat_id: ChatId,
        reason: Option<String>,
        sender_id: UserId,
    },

    /// Anruf-Fehler (offline Ziel, fehlende Mitgliedschaft, Gegenseite)
    CallError {
        chat_id: ChatId,
        error: Value,
        sender_id: UserId,
    },

    /// Generischer Fehler an den Verursacher
    Error { message: String },
}

impl ServerEvent {
    /// Generischer Fehler aus einer beliebigen Nachricht
    pub fn fehler(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Anruf-Fehler mit Text-Begruendung
    pub fn anruf_fehler(chat_id: ChatId, sender_id: UserId, grund: &str) -> Self {
        Self::CallError {
            chat_id,
            error: Value::String(grund.to_string()),
            sender_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
