//! Request tracing capability (`trace`).
//!
//! Opens one span per request and logs the outcome when the inner handler
//! returns.

use std::time::{Duration, Instant};

use tracing::{Instrument, info, info_span};

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::middleware::Middleware;
use crate::request::Request;

/// Logs method, path, status and latency for every request passing through.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        BoxedHandler::from_erased(TraceLayer { next })
    }
}

struct TraceLayer {
    next: BoxedHandler,
}

impl ErasedHandler for TraceLayer {
    fn call(&self, req: Request) -> BoxFuture {
        let span = info_span!(
            "request",
            method = %req.method(),
            path = req.path(),
            peer = %req.remote_addr(),
        );
        let fut = self.next.call(req);
        Box::pin(
            async move {
                let started = Instant::now();
                let res = fut.await;
                info!(
                    status = res.status_code().as_u16(),
                    latency_ms = millis(started.elapsed()),
                    "request completed"
                );
                res
            }
            .instrument(span),
        )
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
