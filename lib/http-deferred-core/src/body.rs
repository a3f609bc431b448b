//! Body serialization utilities.

use bytes::Bytes;

use crate::Result;

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use http_deferred_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Login { user: String }
///
/// let bytes = to_json(&Login { user: "alice".to_string() }).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"user":"alice"}"#);
/// ```
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// Uses `serde_path_to_error`, so the error names the exact field that
/// failed (e.g. `errors[0].code`).
///
/// # Errors
///
/// Returns [`crate::Error::JsonDeserialization`] if the bytes are not valid
/// JSON for `T`.
///
/// # Example
///
/// ```
/// use http_deferred_core::from_json;
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize)]
/// struct Login { user: String }
///
/// let login: Login = from_json(br#"{"user":"alice"}"#).expect("deserialize");
/// assert_eq!(login, Login { user: "alice".to_string() });
/// ```
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        crate::Error::json_deserialization(e.path().to_string(), e.inner().to_string())
    })
}
