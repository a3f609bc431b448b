//! Status-code groups and the code argument accepted by
//! [`ErrorAwareRequest::handle`](crate::ErrorAwareRequest::handle).
//!
//! A handler can be bound to a single code, an explicit list of codes, or a
//! whole group through its alias (`"4XX"` or `"5XX"`).
//!
//! ```
//! use http_deferred_core::{ErrorCodes, StatusGroup};
//!
//! assert_eq!(ErrorCodes::from(500).resolve().unwrap(), vec![500]);
//! assert_eq!(ErrorCodes::from("5XX").resolve().unwrap(), StatusGroup::ServerError.codes());
//! assert!(ErrorCodes::from("6XX").resolve().is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Client error codes, from the Wikipedia list of HTTP status codes.
pub const CLIENT_ERROR_CODES: [u16; 38] = [
    400, 401, 402, 403, 404, 405, 406, 407, 408, 409, 410, 411, 412, 413, 414, 415, 416, 417, 418,
    419, 420, 422, 423, 424, 425, 426, 428, 431, 440, 444, 449, 450, 451, 494, 495, 496, 497, 499,
];

/// Server error codes, from the Wikipedia list of HTTP status codes.
pub const SERVER_ERROR_CODES: [u16; 19] = [
    500, 501, 502, 503, 504, 505, 506, 507, 508, 509, 510, 511, 520, 521, 522, 523, 524, 598, 599,
];

/// A named range of error status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusGroup {
    /// `4XX`
    ClientError,
    /// `5XX`
    ServerError,
}

impl StatusGroup {
    /// The alias string for this group.
    #[must_use]
    pub const fn alias(self) -> &'static str {
        match self {
            Self::ClientError => "4XX",
            Self::ServerError => "5XX",
        }
    }

    /// The codes in this group, in table order.
    #[must_use]
    pub const fn codes(self) -> &'static [u16] {
        match self {
            Self::ClientError => &CLIENT_ERROR_CODES,
            Self::ServerError => &SERVER_ERROR_CODES,
        }
    }

    /// Returns `true` if `code` belongs to this group's table.
    #[must_use]
    pub fn contains(self, code: u16) -> bool {
        self.codes().contains(&code)
    }

    /// Look up a group by its exact alias.
    #[must_use]
    pub fn from_alias(alias: &str) -> Option<Self> {
        match alias {
            "4XX" => Some(Self::ClientError),
            "5XX" => Some(Self::ServerError),
            _ => None,
        }
    }
}

impl fmt::Display for StatusGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alias())
    }
}

impl FromStr for StatusGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_alias(s).ok_or_else(|| Error::invalid_error_code(s))
    }
}

/// The codes a handler is bound to, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCodes {
    /// A single status code.
    Single(u16),
    /// An explicit list of status codes, kept as given.
    List(Vec<u16>),
    /// A known group.
    Group(StatusGroup),
    /// A group alias still to be resolved.
    Alias(String),
}

impl ErrorCodes {
    /// Normalize into the list of codes to match against.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidErrorCode`] for an alias other than `"4XX"` or `"5XX"`.
    pub fn resolve(&self) -> Result<Vec<u16>> {
        match self {
            Self::Single(code) => Ok(vec![*code]),
            Self::List(codes) => Ok(codes.clone()),
            Self::Group(group) => Ok(group.codes().to_vec()),
            Self::Alias(alias) => alias
                .parse::<StatusGroup>()
                .map(|group| group.codes().to_vec()),
        }
    }
}

impl From<u16> for ErrorCodes {
    fn from(code: u16) -> Self {
        Self::Single(code)
    }
}

impl From<http::StatusCode> for ErrorCodes {
    fn from(status: http::StatusCode) -> Self {
        Self::Single(status.as_u16())
    }
}

impl From<Vec<u16>> for ErrorCodes {
    fn from(codes: Vec<u16>) -> Self {
        Self::List(codes)
    }
}

impl From<&[u16]> for ErrorCodes {
    fn from(codes: &[u16]) -> Self {
        Self::List(codes.to_vec())
    }
}

impl<const N: usize> From<[u16; N]> for ErrorCodes {
    fn from(codes: [u16; N]) -> Self {
        Self::List(codes.to_vec())
    }
}

impl From<StatusGroup> for ErrorCodes {
    fn from(group: StatusGroup) -> Self {
        Self::Group(group)
    }
}

impl From<&str> for ErrorCodes {
    fn from(alias: &str) -> Self {
        Self::Alias(alias.to_string())
    }
}

impl From<String> for ErrorCodes {
    fn from(alias: String) -> Self {
        Self::Alias(alias)
    }
}
