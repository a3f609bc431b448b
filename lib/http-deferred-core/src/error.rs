//! Failure outcomes of a request.
//!
//! A request fails in one of two ways: the server answered with a status that
//! is not a success ([`Error::Http`]), or no answer came back at all
//! ([`Error::Transport`]). Status handlers only ever see the first kind; the
//! second dispatches with status `0`.

use bytes::Bytes;
use derive_more::{Display, Error, From};

/// Why no response was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TransportKind {
    /// The connection could not be established or broke mid-exchange.
    #[display("connection error")]
    Connect,
    /// TLS handshake or certificate failure.
    #[display("TLS error")]
    Tls,
    /// The exchange did not finish in time.
    #[display("timeout")]
    Timeout,
}

/// Failure outcome of an http-deferred request.
///
/// `Clone` so one outcome can be piped into several
/// [`Deferred`](crate::Deferred)s.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error, From)]
pub enum Error {
    /// The server answered with a non-success status.
    #[display("{status} {reason}")]
    #[from(skip)]
    Http {
        /// Status code of the response.
        status: u16,
        /// Canonical reason phrase.
        reason: String,
        /// Raw body, possibly empty.
        #[error(not(source))]
        body: Bytes,
    },

    /// No response was received.
    #[display("{kind}: {detail}")]
    #[from(skip)]
    Transport {
        /// Failure category.
        kind: TransportKind,
        /// Message of the underlying failure.
        detail: String,
    },

    /// The request could not be built.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// A handler was bound to a group alias other than `"4XX"` / `"5XX"`.
    #[display("unknown status group alias `{_0}`")]
    #[from(skip)]
    InvalidErrorCode(#[error(not(source))] String),

    /// A value could not be encoded as JSON.
    #[display("cannot encode JSON: {_0}")]
    #[from(skip)]
    JsonSerialization(#[error(not(source))] String),

    /// A body could not be decoded; `path` points at the offending field.
    #[display("cannot decode JSON at `{path}`: {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// Field path, e.g. `errors[0].code`.
        path: String,
        /// Decoder message.
        message: String,
    },

    /// Malformed request URL.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonSerialization(err.to_string())
    }
}

impl Error {
    /// A status failure without a body.
    #[must_use]
    pub fn http(status: u16, reason: impl Into<String>) -> Self {
        Self::http_with_body(status, reason, Bytes::new())
    }

    /// A status failure carrying the response body.
    #[must_use]
    pub fn http_with_body(status: u16, reason: impl Into<String>, body: Bytes) -> Self {
        Self::Http {
            status,
            reason: reason.into(),
            body,
        }
    }

    fn transport(kind: TransportKind, detail: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            detail: detail.into(),
        }
    }

    /// A connection failure.
    #[must_use]
    pub fn connection(detail: impl Into<String>) -> Self {
        Self::transport(TransportKind::Connect, detail)
    }

    /// A TLS failure.
    #[must_use]
    pub fn tls(detail: impl Into<String>) -> Self {
        Self::transport(TransportKind::Tls, detail)
    }

    /// A timed out exchange.
    #[must_use]
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::transport(TransportKind::Timeout, detail)
    }

    /// A request that could not be built.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// An unknown status group alias.
    #[must_use]
    pub fn invalid_error_code(alias: impl Into<String>) -> Self {
        Self::InvalidErrorCode(alias.into())
    }

    /// A decoding failure at `path`.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Category of a transport failure.
    #[must_use]
    pub const fn transport_kind(&self) -> Option<TransportKind> {
        match self {
            Self::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The exchange timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.transport_kind() == Some(TransportKind::Timeout)
    }

    /// The connection failed.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        self.transport_kind() == Some(TransportKind::Connect)
    }

    /// Status of the response, if one was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Status code used for dispatch: `0` when there was no response.
    #[must_use]
    pub const fn dispatch_status(&self) -> u16 {
        match self.status() {
            Some(status) => status,
            None => 0,
        }
    }

    /// Body of the response, if one was received.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        match self {
            Self::Http { body, .. } => Some(body),
            _ => None,
        }
    }
}
