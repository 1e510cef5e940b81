use bytes::Bytes;
use msync_types::{Envelope, Payload, Value};

use crate::error::{TransportError, TransportResult};
use crate::message::WireMessage;

/// JSON codec: the payload map is the body, everything else travels in the
/// headers.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode an envelope into a wire message.
    pub fn encode(envelope: &Envelope) -> TransportResult<WireMessage> {
        let body = serde_json::to_vec(&envelope.payload)
            .map_err(|e| TransportError::Codec(e.to_string()))?;
        Ok(WireMessage::new(body, envelope.headers()))
    }

    /// Decode a wire message back into a validated envelope.
    pub fn decode(message: &WireMessage) -> TransportResult<Envelope> {
        let payload = Self::decode_payload(&message.data)?;
        Ok(Envelope::from_wire(message.headers.clone(), payload)?)
    }

    /// Decode a body only. An empty body is an empty payload; anything other
    /// than a JSON object is a codec error.
    pub fn decode_payload(data: &Bytes) -> TransportResult<Payload> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Payload::new());
        }
        match serde_json::from_slice::<Value>(data) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(TransportError::Codec(format!(
                "payload must be a JSON object, got {}",
                kind(&other)
            ))),
            Err(e) => Err(TransportError::Codec(e.to_string())),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
