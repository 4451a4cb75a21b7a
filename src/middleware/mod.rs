//! Capabilities: handler transformers placed in front of the terminal handler.
//!
//! A capability accepts the next handler in the chain and returns a handler
//! that wraps it. It may run code before and after calling inward, or
//! short-circuit by answering the request itself and never calling inward.
//!
//! Three ways to write one:
//!
//! ```rust
//! use portico::middleware::{self, Middleware, Next};
//! use portico::{BoxedHandler, Request, Response};
//! use http::StatusCode;
//!
//! // 1. An async function over (request, next).
//! let deny_deletes = middleware::from_fn(|req: Request, next: Next| async move {
//!     if req.method() == http::Method::DELETE {
//!         return Response::status(StatusCode::METHOD_NOT_ALLOWED);
//!     }
//!     next.run(req).await
//! });
//!
//! // 2. A plain function from handler to handler.
//! let passthrough = |next: BoxedHandler| next;
//!
//! // 3. Your own type implementing `Middleware`.
//! # fn assert_middleware(_: impl Middleware) {}
//! # assert_middleware(deny_deletes);
//! # assert_middleware(passthrough);
//! ```
//!
//! Built-in capabilities:
//! - [`authz`] — rejects requests that fail an authorization check
//! - [`trace`] — per-request span with method, path, status, latency

use std::future::Future;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

pub mod authz;
pub mod trace;

pub use authz::Authz;
pub use trace::Trace;

/// A handler transformer: wraps `next`, never replaces the request path.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        self(next)
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The remainder of the chain, as seen from inside a [`from_fn`] middleware.
pub struct Next {
    inner: BoxedHandler,
}

impl Next {
    /// Passes the request inward and resolves to the inner response.
    pub fn run(self, req: Request) -> BoxFuture {
        self.inner.call(req)
    }
}

// ── from_fn ───────────────────────────────────────────────────────────────────

/// Builds a [`Middleware`] from an async function of `(Request, Next)`.
pub fn from_fn<F, Fut, R>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    FromFn { f }
}

/// Middleware returned by [`from_fn`].
#[derive(Clone)]
pub struct FromFn<F> {
    f: F,
}

impl<F, Fut, R> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        BoxedHandler::from_erased(FromFnLayer { f: self.f.clone(), next })
    }
}

struct FromFnLayer<F> {
    f: F,
    next: BoxedHandler,
}

impl<F, Fut, R> ErasedHandler for FromFnLayer<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.f)(req, Next { inner: self.next.clone() });
        Box::pin(async move { fut.await.into_response() })
    }
}

/// A response produced without calling inward, e.g. a rejection.
pub(crate) fn ready(res: Response) -> BoxFuture {
    Box::pin(std::future::ready(res))
}
