//! Deferred HTTP requests with status-code based error dispatch.
//!
//! Requests are issued on the tokio runtime and come back as a
//! [`Deferred`], a settle-once outcome with ordered success, failure and
//! always callbacks that can also be awaited. Wrapping one in an
//! [`ErrorAwareRequest`] lets callers bind failure handlers to exact status
//! codes, code lists, the `"4XX"` / `"5XX"` groups, and a final
//! `unhandled` fallback.
//!
//! # Example
//!
//! ```ignore
//! use http_deferred::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! pub struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! let client = HyperClient::new();
//! let request = Request::builder(Method::GET, "https://api.example.com/users/42".parse()?).build();
//!
//! let users = client.send_error_aware(request);
//! users
//!     .handle(404, |_| println!("no such user"))?
//!     .handle("5XX", |payload| eprintln!("server trouble: {}", payload.message))?
//!     .unhandled(|payload| eprintln!("unexpected failure: {}", payload.message));
//!
//! let user: User = users.await?.json()?;
//! ```

mod client;
mod config;
mod connector;
pub mod prelude;

// Re-export client types
pub use client::{HyperClient, HyperClientBuilder};
pub use config::{ClientConfig, ClientConfigBuilder, PoolConfig};

// Re-export core types
pub use http_deferred_core::{
    CLIENT_ERROR_CODES, Deferred, DeferredFuture, DeferredState, DispatchPhase, Error,
    ErrorAwareRequest, ErrorCodes, ErrorPayload, HttpClient, HttpClientExt, Method, Progress,
    Promise, Propagation, Request, RequestBuilder, Response, Result, SERVER_ERROR_CODES,
    StatusGroup, TransportKind, all_settled, from_json, to_json, when_all,
};

// Re-export http types for status codes and headers
pub use http_deferred_core::{StatusCode, header};

pub use url;
