//! Wire envelope shared by every broker channel.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::payloads::ChannelPayload;

/// Errors raised while turning raw broker payloads into envelopes or typed payloads.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("envelope payload does not match {expected}: {source}")]
    Payload {
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("payload must serialize to a JSON object")]
    NotAnObject,
}

/// The unit published on every channel.
///
/// `kind` disambiguates payload shapes on channels that multiplex several
/// events. Each envelope is self-contained: decoding never depends on
/// channel-specific state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Milliseconds since the Unix epoch at publish time.
    pub timestamp: i64,
}

impl Envelope {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Build an envelope from a typed channel payload.
    pub fn from_payload<P: ChannelPayload>(payload: &P) -> Result<Self, DecodeError> {
        let value = serde_json::to_value(payload).map_err(|source| DecodeError::Payload {
            expected: std::any::type_name::<P>(),
            source,
        })?;

        let Value::Object(fields) = value else {
            return Err(DecodeError::NotAnObject);
        };

        Ok(Self {
            kind: payload.kind().to_string(),
            fields,
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn field_i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }

    pub fn field_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    /// Correlation id carried by request/response channels.
    pub fn request_id(&self) -> Option<&str> {
        self.field_str("requestId")
    }

    /// Decode the fields into a typed payload.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|source| {
            DecodeError::Payload {
                expected: std::any::type_name::<T>(),
                source,
            }
        })
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(raw).map_err(DecodeError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::payloads::{EconomyRequest, EconomyResponse};
    use uuid::Uuid;

    #[test]
    fn test_envelope_wire_shape_uses_type_key() {
        let envelope = Envelope::new("deposit").with_field("amount", 25.5);
        let json: Value = serde_json::from_str(&envelope.encode().unwrap()).unwrap();

        assert_eq!(json["type"], "deposit");
        assert_eq!(json["fields"]["amount"], 25.5);
        assert!(json["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_typed_payload_survives_the_wire() {
        let player = Uuid::new_v4();
        let request = EconomyRequest::deposit("req-1", player, 100.0, "vote reward");
        let envelope = Envelope::from_payload(&request).unwrap();
        assert_eq!(envelope.kind, "deposit");
        assert_eq!(envelope.request_id(), Some("req-1"));

        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        let back: EconomyRequest = decoded.payload().unwrap();
        assert_eq!(back.uuid, player);
        assert_eq!(back.amount, 100.0);
    }

    #[test]
    fn test_malformed_payloads_are_decode_errors() {
        assert!(matches!(
            Envelope::decode("not json"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            Envelope::decode(r#"{"fields":{}}"#),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_fields_default_to_empty_map() {
        let envelope = Envelope::decode(r#"{"type":"ping","timestamp":1}"#).unwrap();
        assert!(envelope.fields.is_empty());
        assert_eq!(envelope.timestamp, 1);
    }

    #[test]
    fn test_payload_shape_mismatch_is_reported() {
        let envelope = Envelope::new("response").with_field("requestId", 5);
        let err = envelope.payload::<EconomyResponse>().unwrap_err();
        assert!(matches!(err, DecodeError::Payload { .. }));
    }
}
