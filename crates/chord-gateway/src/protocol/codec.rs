//! Conversion between payloads and WebSocket frames

use super::Payload;
use crate::error::{GatewayError, GatewayResult};
use tokio_tungstenite::tungstenite::Message;

/// Encode a payload as a text frame
pub fn encode(payload: &Payload) -> GatewayResult<Message> {
    payload
        .to_json()
        .map(Message::text)
        .map_err(GatewayError::Encoding)
}

/// Decode a data frame. Control frames yield `Ok(None)`; close frames are the
/// caller's business.
pub fn decode(message: &Message) -> GatewayResult<Option<Payload>> {
    let payload = match message {
        Message::Text(text) => Payload::from_json(text),
        Message::Binary(bytes) => Payload::from_slice(bytes),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => {
            return Ok(None)
        }
    };
    payload.map(Some).map_err(GatewayError::Decoding)
}
