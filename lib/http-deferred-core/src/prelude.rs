//! Prelude module for convenient imports.
//!
//! ```ignore
//! use http_deferred_core::prelude::*;
//! ```

pub use crate::{
    Deferred, Error, ErrorAwareRequest, ErrorCodes, ErrorPayload, HttpClient, HttpClientExt,
    Method, Progress, Promise, Propagation, Request, Response, Result, StatusGroup, all_settled,
    when_all,
};
