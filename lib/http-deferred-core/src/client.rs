//! HTTP client traits.
//!
//! - [`HttpClient`] - Low-level HTTP execution
//! - [`HttpClientExt`] - Requests as [`Deferred`] or [`ErrorAwareRequest`]

use std::future::Future;

use bytes::Bytes;

use crate::{Deferred, Error, ErrorAwareRequest, Request, Response, Result};

/// Core HTTP client trait.
///
/// This trait defines the interface for executing HTTP requests.
/// Implementations should be async-first and support connection pooling.
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request and return the response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns an error if no response was received:
    /// - Network errors
    /// - TLS errors
    /// - Timeouts
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send;
}

/// Extension trait for [`HttpClient`] issuing requests as deferreds.
pub trait HttpClientExt: HttpClient + Clone + 'static {
    /// Prepare a request, issued on the tokio runtime once started.
    ///
    /// Nothing is sent until [`Deferred::start`], an `.await`, or a
    /// combinator starts it, so every callback registered before that sees
    /// the outcome. The deferred resolves with 2xx (and 304) responses and
    /// rejects with [`Error::Http`] for any other status, or with the
    /// transport error.
    ///
    /// # Panics
    ///
    /// Starting panics outside of a tokio runtime.
    fn send(&self, request: Request<Bytes>) -> Deferred<Response<Bytes>, Error> {
        let client = self.clone();
        Deferred::lazy(async move {
            client
                .execute(request)
                .await
                .and_then(Response::error_for_status)
        })
    }

    /// Prepare a request wrapped for status-code dispatch.
    ///
    /// Register handlers, then [`start`](ErrorAwareRequest::start) or await
    /// it.
    ///
    /// # Panics
    ///
    /// Starting panics outside of a tokio runtime.
    fn send_error_aware(&self, request: Request<Bytes>) -> ErrorAwareRequest<Response<Bytes>> {
        ErrorAwareRequest::new(&self.send(request))
    }
}

// Blanket implementation for all cloneable HttpClient implementors
impl<T: HttpClient + Clone + 'static> HttpClientExt for T {}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert2::{check, let_assert};

    use super::*;
    use crate::Method;

    /// Replies with a fixed status and body.
    #[derive(Clone)]
    struct StubClient {
        status: u16,
        body: &'static str,
    }

    impl HttpClient for StubClient {
        async fn execute(&self, _request: Request<Bytes>) -> Result<Response<Bytes>> {
            Ok(Response::new(
                self.status,
                HashMap::new(),
                Bytes::from_static(self.body.as_bytes()),
            ))
        }
    }

    /// Never gets a response.
    #[derive(Clone)]
    struct DownClient;

    impl HttpClient for DownClient {
        async fn execute(&self, _request: Request<Bytes>) -> Result<Response<Bytes>> {
            Err(Error::connection("connection refused"))
        }
    }

    fn request() -> Request<Bytes> {
        let url = url::Url::parse("http://localhost/items").expect("url");
        Request::builder(Method::GET, url).build()
    }

    #[tokio::test]
    async fn send_resolves_success() {
        let client = StubClient {
            status: 200,
            body: "[]",
        };

        let outcome = client.send(request()).await;

        let_assert!(Ok(response) = outcome);
        check!(response.status() == 200);
    }

    #[tokio::test]
    async fn send_rejects_error_status() {
        let client = StubClient {
            status: 503,
            body: r#"{"message":"maintenance"}"#,
        };

        let outcome = client.send(request()).await;

        let_assert!(Err(error) = outcome);
        check!(error.status() == Some(503));
    }

    #[tokio::test]
    async fn send_error_aware_dispatches() {
        let client = StubClient {
            status: 503,
            body: r#"{"message":"maintenance"}"#,
        };
        let handled = Arc::new(AtomicUsize::new(0));

        let request = client.send_error_aware(request());
        let counter = Arc::clone(&handled);
        let_assert!(
            Ok(_) = request.handle("5XX", move |payload| {
                assert_eq!(payload.message, "maintenance");
                counter.fetch_add(1, Ordering::SeqCst);
            })
        );

        let outcome = request.clone().await;

        check!(outcome.is_err());
        check!(handled.load(Ordering::SeqCst) == 1);
    }

    #[tokio::test]
    async fn send_waits_for_start() {
        let client = StubClient {
            status: 200,
            body: "[]",
        };

        let deferred = client.send(request());
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        check!(deferred.is_pending());

        deferred.start();
        let_assert!(Ok(response) = deferred.clone().await);
        check!(response.status() == 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn handlers_registered_before_start_see_every_claim() {
        let client = StubClient {
            status: 404,
            body: r#"{"message":"gone"}"#,
        };

        for _ in 0..50 {
            let handled = Arc::new(AtomicUsize::new(0));
            let unhandled = Arc::new(AtomicUsize::new(0));

            let request = client.send_error_aware(request());
            // Yield so a worker could run an eagerly spawned exchange.
            tokio::task::yield_now().await;

            let counter = Arc::clone(&unhandled);
            request.unhandled(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            let counter = Arc::clone(&handled);
            let_assert!(
                Ok(_) = request.handle(404, move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            );

            let outcome = request.clone().await;

            check!(outcome.is_err());
            check!(handled.load(Ordering::SeqCst) == 1);
            check!(unhandled.load(Ordering::SeqCst) == 0);
        }
    }

    #[tokio::test]
    async fn transport_errors_dispatch_as_status_zero() {
        let unhandled = Arc::new(AtomicUsize::new(0));

        let request = DownClient.send_error_aware(request());
        let counter = Arc::clone(&unhandled);
        request.unhandled(move |payload| {
            assert_eq!(payload.message, "connection error: connection refused");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = request.clone().await;

        let_assert!(Err(error) = outcome);
        check!(error.is_connection());
        check!(unhandled.load(Ordering::SeqCst) == 1);
    }
}
