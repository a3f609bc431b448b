//! Core types and traits for http-deferred.
//!
//! This crate provides the transport-agnostic pieces:
//! - [`Deferred`] and [`Promise`] - Settle-once outcomes with ordered callbacks
//! - [`when_all`] and [`all_settled`] - Combinators over several promises
//! - [`ErrorAwareRequest`] - Status-code based failure dispatch
//! - [`ErrorCodes`] and [`StatusGroup`] - Codes a handler is bound to
//! - [`ErrorPayload`] - Decoded body of a failed response
//! - [`Request`] and [`Response`] - HTTP request/response types
//! - [`Error`] and [`Result`] - Error handling
//! - [`HttpClient`] and [`HttpClientExt`] - Client traits
//! - [`Method`], [`StatusCode`] and [`header`] - Re-exported from the `http` crate

mod body;
mod client;
mod deferred;
mod error;
mod error_aware;
mod payload;
pub mod prelude;
mod request;
mod response;
mod status;
mod when;

pub use body::{from_json, to_json};
pub use client::{HttpClient, HttpClientExt};
pub use deferred::{Deferred, DeferredFuture, DeferredState, Progress, Promise};
pub use error::{Error, Result, TransportKind};
pub use error_aware::{DispatchPhase, ErrorAwareRequest, Propagation};
pub use payload::ErrorPayload;
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use status::{CLIENT_ERROR_CODES, ErrorCodes, SERVER_ERROR_CODES, StatusGroup};
pub use when::{all_settled, when_all};

// Re-export http crate types for methods, status codes and headers
pub use http::{Method, StatusCode, header};
