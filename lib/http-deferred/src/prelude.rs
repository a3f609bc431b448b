//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and functions
//! for easy glob importing:
//!
//! ```ignore
//! use http_deferred::prelude::*;
//! ```

pub use crate::{
    ClientConfig, Deferred, Error, ErrorAwareRequest, ErrorCodes, ErrorPayload, HttpClient,
    HttpClientExt, HyperClient, Method, Progress, Promise, Propagation, Request, RequestBuilder,
    Response, Result, StatusCode, StatusGroup, all_settled, header, when_all,
};
pub use serde::{Deserialize, Serialize};
