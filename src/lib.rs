//! # portico
//!
//! The front door of a proxying sidecar: an ordered chain of capabilities
//! (authorization, tracing, anything you register) in front of a proxy
//! handler, bound to a socket, with an orderly drain on the way out.
//!
//! ## The contract
//!
//! portico does not forward requests, pick backends, or decide who is
//! authorized. Those are yours: the proxy is the terminal [`Handler`], the
//! policy is a [`Middleware`](middleware::Middleware). portico owns the two
//! things that are easy to get subtly wrong:
//!
//! - **Composition.** A runtime mode string such as `"trace|authz"` becomes
//!   `trace(authz(proxy))`. The first token runs first. An unknown token is a
//!   configuration error reported before any socket is opened.
//! - **Lifecycle.** One blocking [`Gateway::start`] call that returns only
//!   when the gateway has stopped, whichever of explicit shutdown,
//!   cancellation, or SIGTERM/SIGINT asked for it. In-flight requests get a
//!   bounded grace period. The shutdown transition happens exactly once.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use portico::{Gateway, GatewayConfig, Request, Response};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let gateway = Gateway::default();
//!     let config = GatewayConfig::for_port(8080).with_mode("trace|authz");
//!
//!     if let Err(e) = gateway.start(CancellationToken::new(), config, proxy).await {
//!         eprintln!("gateway failed: {e}");
//!         std::process::exit(1);
//!     }
//! }
//!
//! async fn proxy(req: Request) -> Response {
//!     // Forward `req.into_http()` to your backend here.
//!     Response::text(format!("would forward {}", req.path()))
//! }
//! ```

mod config;
mod error;
mod handler;
mod request;
mod response;
mod server;

pub mod chain;
pub mod middleware;
pub mod registry;

pub use config::{
    DEFAULT_CANCEL_GRACE, DEFAULT_READ_TIMEOUT, DEFAULT_SHUTDOWN_GRACE, DEFAULT_WRITE_TIMEOUT,
    GatewayConfig,
};
pub use error::Error;
pub use handler::{BoxFuture, BoxedHandler, Handler};
pub use registry::CapabilityRegistry;
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use server::{Gateway, Phase};
