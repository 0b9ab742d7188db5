//! Decoded message bodies.

use std::fmt;

use serde_json::{json, Value};

use crate::error::Result;

/// A message body wrapped for querying as `{"payload": <body>}`.
///
/// Bodies that parse as JSON are nested as parsed; anything else is nested
/// as the raw decoded string, so `Online` and `"Online"` query the same.
#[derive(Debug, Clone, PartialEq)]
pub struct Document(Value);

impl Document {
    /// Decode a raw message body.
    ///
    /// Fails only when the bytes are not UTF-8. A JSON parse failure is not
    /// an error; the text itself becomes the payload.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)?;
        let payload =
            serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.to_string()));
        Ok(Self::from_payload(payload))
    }

    /// Wrap an already parsed payload.
    pub fn from_payload(payload: Value) -> Self {
        Self(json!({ "payload": payload }))
    }

    /// The wrapped payload.
    pub fn payload(&self) -> &Value {
        &self.0["payload"]
    }

    /// The full document, including the `payload` key.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_json_body_is_nested() {
        let document = Document::decode(br#"{"POWER":"ON"}"#).unwrap();
        assert_eq!(document.as_value(), &json!({"payload": {"POWER": "ON"}}));
    }

    #[test]
    fn test_scalar_json_body() {
        let document = Document::decode(b"21.5").unwrap();
        assert_eq!(document.payload(), &json!(21.5));
    }

    #[test]
    fn test_non_json_body_is_raw_string() {
        let document = Document::decode(b"Offline").unwrap();
        assert_eq!(document.payload(), &json!("Offline"));
    }

    #[test]
    fn test_empty_body_is_empty_string() {
        let document = Document::decode(b"").unwrap();
        assert_eq!(document.payload(), &json!(""));
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let result = Document::decode(&[0x4f, 0xff, 0xfe]);
        assert!(matches!(result, Err(Error::Decode(_))));
    }
}
