//! Wire-Format fuer TCP-Verbindungen
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + JSON-Payload.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge gibt die Anzahl der Payload-Bytes an (ohne die 4 Laengen-Bytes).
//! Maximale Frame-Groesse ist konfigurierbar (Standard: 1 MB).
//!
//! ## Fehlertoleranz
//! Ein korrekt gerahmter, aber nicht parsebarer JSON-Payload ist KEIN
//! Codec-Fehler: er dekodiert zu `ClientEvent::Unbekannt` und wird vom
//! Dispatcher verworfen. Nur Framing-Verletzungen (zu grosse Frames)
//! beenden die Verbindung.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::events::{ClientEvent, ServerEvent};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer frame-basierte TCP-Verbindungen
///
/// Implementiert `Decoder` fuer eingehende `ClientEvent`s und
/// `Encoder<ServerEvent>` fuer ausgehende Events, zur nahtlosen
/// Integration mit `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for FrameCodec {
    type Item = ClientEvent;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Warte auf mindestens 4 Bytes fuer das Laengen-Feld
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laenge lesen (big-endian u32) ohne den Buffer zu veraendern
        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        // Maximale Frame-Groesse pruefen
        if length > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                    length, self.max_frame_size
                ),
            ));
        }

        // Pruefen ob der vollstaendige Frame bereits im Buffer ist
        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            // Speicher vorbelegen um Reallocations zu vermeiden
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        // Laengen-Feld verbrauchen
        src.advance(LENGTH_FIELD_SIZE);

        // Payload-Bytes extrahieren
        let payload = src.split_to(length);

        // JSON deserialisieren; fehlgeschlagene Frames werden verworfen,
        // nicht zum Verbindungsabbruch eskaliert
        match serde_json::from_slice::<ClientEvent>(&payload) {
            Ok(event) => Ok(Some(event)),
            Err(e) => {
                tracing::debug!(fehler = %e, "Nicht parsebarer Frame verworfen");
                Ok(Some(ClientEvent::Unbekannt))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<ServerEvent> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: ServerEvent, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // JSON serialisieren
        let json = serde_json::to_vec(&item).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON-Serialisierung fehlgeschlagen: {}", e),
            )
        })?;

        // Groesse pruefen
        if json.len() > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Nachricht zu gross: {} Bytes (Maximum: {} Bytes)",
                    json.len(),
                    self.max_frame_size
                ),
            ));
        }

        // Laengen-Feld + Payload schreiben
        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fluester_core::types::ChatId;

    fn encode_roh(payload: &[u8], dst: &mut BytesMut) {
        dst.put_u32(payload.len() as u32);
        dst.put_slice(payload);
    }

    #[test]
    fn frame_dekodieren() {
        let mut codec = FrameCodec::new();
        let chat = ChatId::new();
        let json = format!(
            r#"{{"type":"message","chatId":"{}","content":"hallo"}}"#,
            chat.inner()
        );

        let mut buf = BytesMut::new();
        encode_roh(json.as_bytes(), &mut buf);

        let event = codec.decode(&mut buf).unwrap().unwrap();
        match event {
            ClientEvent::Message { chat_id, content } => {
                assert_eq!(chat_id, chat);
                assert_eq!(content, "hallo");
            }
            other => panic!("Falsche Variante: {:?}", other),
        }
        assert!(buf.is_empty(), "Buffer muss vollstaendig verbraucht sein");
    }

    #[test]
    fn unvollstaendiger_frame_wartet() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        // Nur das Laengen-Feld, Payload fehlt noch
        buf.put_u32(100);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn zu_grosser_frame_ist_fehler() {
        let mut codec = FrameCodec::with_max_size(16);
        let mut buf = BytesMut::new();
        buf.put_u32(1024);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn kaputtes_json_wird_verworfen_statt_fehler() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        encode_roh(b"{kein json", &mut buf);

        let event = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(event, ClientEvent::Unbekannt));
    }

    #[test]
    fn encode_decode_rundlauf() {
        let mut codec = FrameCodec::new();
        let chat = ChatId::new();
        let event = ServerEvent::ChatCreated { chat_id: chat };

        let mut buf = BytesMut::new();
        codec.encode(event, &mut buf).unwrap();

        // Laengenpraefix pruefen
        let laenge = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(laenge, buf.len() - LENGTH_FIELD_SIZE);

        let json: serde_json::Value =
            serde_json::from_slice(&buf[LENGTH_FIELD_SIZE..]).unwrap();
        assert_eq!(json["type"], "chat_created");
    }

    #[test]
    fn mehrere_frames_im_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        encode_roh(br#"{"type":"authenticate","token":"a"}"#, &mut buf);
        encode_roh(br#"{"type":"authenticate","token":"b"}"#, &mut buf);

        let erste = codec.decode(&mut buf).unwrap().unwrap();
        let zweite = codec.decode(&mut buf).unwrap().unwrap();
        match (erste, zweite) {
            (
                ClientEvent::Authenticate { token: t1, .. },
                ClientEvent::Authenticate { token: t2, .. },
            ) => {
                assert_eq!(t1, "a");
                assert_eq!(t2, "b");
            }
            other => panic!("Falsche Varianten: {:?}", other),
        }
    }
}
