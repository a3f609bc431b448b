//! Failure payload handed to status handlers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{Error, Result};

/// Decoded body of a failed response: `{ "message": ..., ...fields }`.
///
/// A JSON object body keeps every field; anything else becomes a synthetic
/// payload carrying only a message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human readable error message.
    #[serde(default)]
    pub message: String,
    /// Every other field of the decoded body.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ErrorPayload {
    /// A payload with only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Decode a raw response body, falling back to a synthetic payload.
    ///
    /// A string `message` is taken as-is; `null` or a missing one gives an
    /// empty message, and any other JSON value is kept as its JSON text.
    #[must_use]
    pub fn decode(status: u16, body: &[u8]) -> Self {
        let text = || String::from_utf8_lossy(body);
        match crate::from_json::<Value>(body) {
            Ok(Value::Object(mut fields)) => {
                let message = match fields.remove("message") {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(message)) => message,
                    Some(other) => other.to_string(),
                };
                Self { message, fields }
            }
            Ok(_) => {
                debug!(status, "failure body is JSON but not an object");
                Self::message(format!(
                    "Response body is not a JSON object: {}. Code: {status}",
                    text()
                ))
            }
            Err(err) => {
                debug!(status, error = %err, "failure body is not JSON");
                Self::message(format!(
                    "Unable to parse response text as JSON: {}. Code: {status}",
                    text()
                ))
            }
        }
    }

    /// Build the payload for a failed outcome.
    ///
    /// HTTP errors decode their body; other transport errors keep their
    /// display text as the message.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::Http { status, body, .. } => {
                Self::decode(*status, body.as_ref())
            }
            other => Self::message(other.to_string()),
        }
    }

    /// Single field of the decoded body.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Re-decode the payload into a typed error.
    pub fn decode_as<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        crate::from_json(&crate::to_json(self)?)
    }
}
