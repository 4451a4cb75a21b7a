//! Authorization capability (`authz`).
//!
//! The policy itself is supplied by the caller as a predicate over the
//! request. Requests that fail it are answered with `401 Unauthorized` and
//! never reach the inner handler.

use std::sync::Arc;

use http::header::{AUTHORIZATION, HeaderName};
use http::StatusCode;
use tracing::debug;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::middleware::{Middleware, ready};
use crate::request::Request;
use crate::response::Response;

type Check = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Rejects requests for which the configured check returns `false`.
///
/// ```rust
/// use portico::middleware::Authz;
///
/// // Default policy: a non-empty `Authorization` header must be present.
/// let authz = Authz::default();
///
/// // Custom policy.
/// let authz = Authz::new(|req| req.header("x-api-key") == Some("s3cret"));
/// ```
#[derive(Clone)]
pub struct Authz {
    check: Check,
}

impl Authz {
    pub fn new(check: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        Self { check: Arc::new(check) }
    }

    /// Requires `name` to be present with a non-empty value.
    pub fn require_header(name: HeaderName) -> Self {
        Self::new(move |req| req.headers().get(&name).is_some_and(|v| !v.is_empty()))
    }
}

impl Default for Authz {
    fn default() -> Self {
        Self::require_header(AUTHORIZATION)
    }
}

impl Middleware for Authz {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        BoxedHandler::from_erased(AuthzLayer { check: Arc::clone(&self.check), next })
    }
}

struct AuthzLayer {
    check: Check,
    next: BoxedHandler,
}

impl ErasedHandler for AuthzLayer {
    fn call(&self, req: Request) -> BoxFuture {
        if (self.check)(&req) {
            return self.next.call(req);
        }
        debug!(peer = %req.remote_addr(), path = req.path(), "authz rejected request");
        ready(Response::builder().status(StatusCode::UNAUTHORIZED).text("unauthorized"))
    }
}
