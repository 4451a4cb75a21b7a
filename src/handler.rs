//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! A chain is a stack of capabilities of *different* concrete types, each
//! wrapping the next. To nest them uniformly every layer is erased to a
//! [`BoxedHandler`], an `Arc` around a trait object:
//!
//! ```text
//! async fn proxy(req: Request) -> Response { … }   ← caller writes this
//!        ↓ proxy.into_boxed_handler()
//! BoxedHandler(Arc::new(FnHandler(proxy)))          ← terminal layer
//!        ↓ authz.wrap(terminal)
//! BoxedHandler(Arc::new(AuthzLayer { next, .. }))   ← outer layer
//!        ↓
//! handler.call(req)  at request time                ← one vtable call per layer
//! ```
//!
//! The composed handler is built once and never mutated. Connection tasks
//! share it by cloning the `Arc`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
pub(crate) trait ErasedHandler: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
///
/// Cloning is one atomic increment. Capabilities receive the next layer as a
/// `BoxedHandler` and return a new one that wraps it.
#[derive(Clone)]
pub struct BoxedHandler(Arc<dyn ErasedHandler>);

impl BoxedHandler {
    /// Invokes the handler.
    pub fn call(&self, req: Request) -> BoxFuture {
        self.0.call(req)
    }
}

impl fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxedHandler")
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid request handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` (or closure) with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// and for [`BoxedHandler`] itself. The trait is **sealed**: only the impls in
/// this module can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        BoxedHandler::from_erased(FnHandler(self))
    }
}

impl private::Sealed for BoxedHandler {}

impl Handler for BoxedHandler {
    fn into_boxed_handler(self) -> BoxedHandler {
        self
    }
}

impl BoxedHandler {
    pub(crate) fn from_erased(handler: impl ErasedHandler) -> Self {
        Self(Arc::new(handler))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a typed function to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
