//! Per-connection wire codec (spec.md §4.4 "Wire framing"): JSON text
//! frames, or length-prefixed binary frames carrying the same
//! [`Envelope`]. Selected once at handshake from the `binary`
//! subprotocol request and fixed for the connection's lifetime.

use axum::extract::ws::Message;
use bytes::{Buf, BufMut, BytesMut};

use super::envelope::Envelope;
use super::BusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Json,
    Binary,
}

impl Codec {
    pub fn encode(self, envelope: &Envelope) -> Result<Message, BusError> {
        match self {
            Codec::Json => {
                let text = serde_json::to_string(envelope).map_err(|e| BusError::Codec(e.to_string()))?;
                Ok(Message::Text(text))
            }
            Codec::Binary => {
                let body = bincode::serialize(envelope).map_err(|e| BusError::Codec(e.to_string()))?;
                let mut framed = BytesMut::with_capacity(4 + body.len());
                framed.put_u32(body.len() as u32);
                framed.put_slice(&body);
                Ok(Message::Binary(framed.to_vec()))
            }
        }
    }

    /// Decodes an inbound client control frame. Client messages are
    /// always JSON over a text frame in this implementation regardless
    /// of the negotiated server-push codec — binary is only used for
    /// high-volume server-to-client payloads (market data, trades).
    pub fn decode_client_frame(message: &Message) -> Result<super::envelope::ClientMessage, BusError> {
        match message {
            Message::Text(text) => {
                serde_json::from_str(text).map_err(|e| BusError::Codec(e.to_string()))
            }
            Message::Binary(bytes) => decode_binary_envelope_as_client_message(bytes),
            _ => Err(BusError::Codec("unsupported frame type".to_string())),
        }
    }
}

fn decode_binary_envelope_as_client_message(bytes: &[u8]) -> Result<super::envelope::ClientMessage, BusError> {
    let mut buf = bytes;
    if buf.len() < 4 {
        return Err(BusError::Codec("frame shorter than length prefix".to_string()));
    }
    let len = buf.get_u32() as usize;
    if buf.len() < len {
        return Err(BusError::Codec("frame shorter than declared length".to_string()));
    }
    serde_json::from_slice(&buf[..len]).map_err(|e| BusError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::envelope::{HeartbeatPayload, MessageType, Payload};

    #[test]
    fn binary_round_trips_an_envelope_through_the_length_prefix() {
        let envelope = Envelope::new(MessageType::Heartbeat, 1000).with_data(Payload::Heartbeat(HeartbeatPayload {
            server_time: 1000,
        }));
        let message = Codec::Binary.encode(&envelope).unwrap();
        let Message::Binary(bytes) = message else {
            panic!("expected a binary frame");
        };
        let mut buf = &bytes[..];
        let len = buf.get_u32() as usize;
        let decoded: Envelope = bincode::deserialize(&buf[..len]).unwrap();
        assert_eq!(decoded.timestamp, 1000);
    }

    #[test]
    fn json_codec_produces_a_text_frame() {
        let envelope = Envelope::new(MessageType::Pong, 5);
        let message = Codec::Json.encode(&envelope).unwrap();
        assert!(matches!(message, Message::Text(_)));
    }
}
