//! Gateway lifecycle and graceful shutdown.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──▶ Starting ──▶ Serving ──▶ ShuttingDown ──▶ Stopped
//!                │                                        ▲
//!                └──────────── bind failure ──────────────┘
//! ```
//!
//! [`Gateway::start`] drives the whole sequence and returns only once the
//! gateway is `Stopped`. Three triggers move it from `Serving` to
//! `ShuttingDown`, and whichever fires first wins:
//!
//! - an explicit [`Gateway::request_shutdown`] / [`Gateway::shutdown`] call,
//!   draining for the requested (or configured) grace period;
//! - the caller's [`CancellationToken`] being cancelled, draining for
//!   `cancel_grace`;
//! - SIGTERM / SIGINT, draining for `shutdown_grace`.
//!
//! Later triggers are logged and ignored. The transition happens exactly once.
//!
//! # Draining
//!
//! On entering `ShuttingDown` the gateway:
//! 1. Stops calling `listener.accept()` and closes the listener, so the port
//!    is free again immediately.
//! 2. Tells every open connection to finish its current request and close.
//!    Idle keep-alive connections close at once.
//! 3. Waits up to the grace period for connection tasks to finish, then
//!    aborts whatever is left. Clients of abandoned requests see the
//!    connection close.

use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chain;
use crate::config::GatewayConfig;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::registry::CapabilityRegistry;
use crate::request::Request;
use crate::response::Response;

/// Where a gateway is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Starting,
    Serving,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Starting => write!(f, "starting"),
            Self::Serving => write!(f, "serving"),
            Self::ShuttingDown => write!(f, "shutting_down"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// The only mutable state shared between the supervisor, the accept loop and
/// shutdown callers. Every transition goes through the watch sender.
#[derive(Debug, Clone)]
struct Lifecycle {
    phase: Phase,
    local_addr: Option<SocketAddr>,
    /// Configured grace of the running instance, used by [`Gateway::shutdown`].
    shutdown_grace: Duration,
    /// Drain window chosen by whichever trigger won.
    grace: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Timeouts {
    read: Duration,
    write: Duration,
}

/// A gateway: one composed handler bound to one listening socket.
///
/// `Gateway` is a cheap handle. Clone it and give the clone to whoever needs
/// to stop the gateway (a signal handler, an admin endpoint) while the
/// original is blocked in [`start`](Gateway::start).
///
/// ```rust,no_run
/// use portico::{Gateway, GatewayConfig, Request};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn proxy(_req: Request) -> &'static str { "" }
/// # async fn run() -> Result<(), portico::Error> {
/// let gateway = Gateway::default();
/// let config = GatewayConfig::for_port(8080).with_mode("trace|authz");
///
/// gateway.start(CancellationToken::new(), config, proxy).await
/// # }
/// ```
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

struct Inner {
    registry: CapabilityRegistry,
    state: watch::Sender<Lifecycle>,
}

impl Default for Gateway {
    /// A gateway resolving modes against [`CapabilityRegistry::with_defaults`].
    fn default() -> Self {
        Self::new(CapabilityRegistry::with_defaults())
    }
}

impl Gateway {
    /// A gateway resolving mode tokens against `registry`.
    pub fn new(registry: CapabilityRegistry) -> Self {
        let (state, _) = watch::channel(Lifecycle {
            phase: Phase::Created,
            local_addr: None,
            shutdown_grace: crate::config::DEFAULT_SHUTDOWN_GRACE,
            grace: crate::config::DEFAULT_SHUTDOWN_GRACE,
        });
        Self { inner: Arc::new(Inner { registry, state }) }
    }

    /// The registry mode tokens are resolved against, e.g. to check a mode
    /// before calling [`start`](Self::start).
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.inner.registry
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.borrow().phase
    }

    /// The bound address while the listener is open.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.state.borrow().local_addr
    }

    /// Resolves with the bound address once the gateway is `Serving`, or with
    /// `None` if it stops (or fails to start) first.
    pub async fn serving(&self) -> Option<SocketAddr> {
        let mut state = self.inner.state.subscribe();
        loop {
            {
                let s = state.borrow_and_update();
                match s.phase {
                    Phase::Serving => return s.local_addr,
                    Phase::ShuttingDown | Phase::Stopped => return None,
                    Phase::Created | Phase::Starting => {}
                }
            }
            if state.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Resolves once the gateway reaches `Stopped`.
    pub async fn stopped(&self) {
        let mut state = self.inner.state.subscribe();
        loop {
            if state.borrow_and_update().phase == Phase::Stopped {
                return;
            }
            if state.changed().await.is_err() {
                return;
            }
        }
    }

    /// Starts draining with the given grace period.
    ///
    /// Returns `true` if this call initiated shutdown. Returns `false`, and
    /// does nothing else, if the gateway is already shutting down, stopped,
    /// or was never started. Draining continues after this returns.
    pub fn request_shutdown(&self, grace: Duration) -> bool {
        let initiated = self.inner.state.send_if_modified(|s| match s.phase {
            Phase::Starting | Phase::Serving => {
                s.phase = Phase::ShuttingDown;
                s.grace = grace;
                true
            }
            Phase::Created | Phase::ShuttingDown | Phase::Stopped => false,
        });
        if initiated {
            info!(?grace, "shutdown initiated");
        } else {
            debug!(phase = %self.phase(), "shutdown request ignored");
        }
        initiated
    }

    /// [`request_shutdown`](Self::request_shutdown) with the configured
    /// `shutdown_grace` of the running instance.
    pub fn shutdown(&self) -> bool {
        let grace = self.inner.state.borrow().shutdown_grace;
        self.request_shutdown(grace)
    }

    /// Builds the chain for `config.mode` around `terminal`, binds
    /// `config.addr`, and serves until shut down.
    ///
    /// Configuration problems (invalid config, unknown mode token) are
    /// reported before any socket is opened. A bind failure is reported
    /// without serving anything. Otherwise this returns `Ok(())` once every
    /// connection has drained or been abandoned at the end of the grace period.
    pub async fn start(
        &self,
        cancel: CancellationToken,
        config: GatewayConfig,
        terminal: impl Handler,
    ) -> Result<(), Error> {
        config.validate()?;
        let handler = chain::build(&config.mode, &self.inner.registry, terminal)?;

        self.begin(&config)?;
        let _stopped = StopOnExit(&self.inner.state);

        let (listener, local_addr) = match bind(&config.addr).await {
            Ok(bound) => bound,
            Err(source) => {
                error!(addr = %config.addr, "failed to bind: {source}");
                return Err(Error::Bind { addr: config.addr.clone(), source });
            }
        };

        self.inner.state.send_modify(|s| {
            s.local_addr = Some(local_addr);
            if s.phase == Phase::Starting {
                s.phase = Phase::Serving;
            }
        });
        info!(addr = %local_addr, mode = %config.mode, "gateway serving");

        self.supervise(cancel, listener, handler, &config).await;

        info!(addr = %local_addr, "gateway stopped");
        Ok(())
    }

    /// `Created | Stopped → Starting`, atomically.
    fn begin(&self, config: &GatewayConfig) -> Result<(), Error> {
        let started = self.inner.state.send_if_modified(|s| {
            if !matches!(s.phase, Phase::Created | Phase::Stopped) {
                return false;
            }
            *s = Lifecycle {
                phase: Phase::Starting,
                local_addr: None,
                shutdown_grace: config.shutdown_grace,
                grace: config.shutdown_grace,
            };
            true
        });
        if started { Ok(()) } else { Err(Error::AlreadyRunning) }
    }

    // ── Shutdown coordination ─────────────────────────────────────────────────

    /// Runs the server while watching the external triggers. Returns only
    /// after the server itself has finished draining.
    async fn supervise(
        &self,
        cancel: CancellationToken,
        listener: TcpListener,
        handler: BoxedHandler,
        config: &GatewayConfig,
    ) {
        let timeouts = Timeouts { read: config.read_timeout, write: config.write_timeout };
        let server = self.run(listener, handler, timeouts);
        tokio::pin!(server);

        let signal = shutdown_signal(config.handle_signals);
        tokio::pin!(signal);

        let mut cancelled = false;
        let mut signalled = false;

        loop {
            tokio::select! {
                () = &mut server => return,

                // Cancellation only initiates the drain. The loop keeps
                // polling `server` until the drain is over.
                () = cancel.cancelled(), if !cancelled => {
                    cancelled = true;
                    info!(grace = ?config.cancel_grace, "cancellation received");
                    self.request_shutdown(config.cancel_grace);
                }

                () = &mut signal, if !signalled => {
                    signalled = true;
                    info!(grace = ?config.shutdown_grace, "termination signal received");
                    self.request_shutdown(config.shutdown_grace);
                }
            }
        }
    }

    // ── Accept loop ───────────────────────────────────────────────────────────

    async fn run(&self, listener: TcpListener, handler: BoxedHandler, timeouts: Timeouts) {
        let draining = CancellationToken::new();
        let mut tasks = JoinSet::new();

        let shutdown = shutdown_requested(self.inner.state.subscribe());
        tokio::pin!(shutdown);

        let grace = loop {
            tokio::select! {
                // Shutdown is checked first so no connection is accepted
                // after it was requested, even if more are queued.
                biased;

                grace = &mut shutdown => break grace,

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };
                    tasks.spawn(serve_connection(
                        stream,
                        peer,
                        handler.clone(),
                        timeouts,
                        draining.clone(),
                    ));
                }

                // Reap finished connection tasks.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        };

        drop(listener);
        draining.cancel();
        info!(in_flight = tasks.len(), ?grace, "stopped accepting, draining connections");

        let drain = async { while tasks.join_next().await.is_some() {} };
        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(
                abandoned = tasks.len(),
                ?grace,
                "grace period elapsed, closing remaining connections"
            );
            tasks.shutdown().await;
        }
    }
}

/// Marks the gateway `Stopped` however `start` exits: normal return, bind
/// failure, or the `start` future being dropped.
struct StopOnExit<'a>(&'a watch::Sender<Lifecycle>);

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|s| {
            s.phase = Phase::Stopped;
            s.local_addr = None;
        });
    }
}

async fn bind(addr: &str) -> std::io::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    Ok((listener, local_addr))
}

/// Resolves with the grace period once the gateway enters `ShuttingDown`.
async fn shutdown_requested(mut state: watch::Receiver<Lifecycle>) -> Duration {
    loop {
        {
            let s = state.borrow_and_update();
            if s.phase == Phase::ShuttingDown {
                return s.grace;
            }
        }
        if state.changed().await.is_err() {
            // Sender lives in the gateway, which outlives the accept loop.
            std::future::pending::<()>().await;
        }
    }
}

// ── Connections ───────────────────────────────────────────────────────────────

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handler: BoxedHandler,
    timeouts: Timeouts,
    draining: CancellationToken,
) {
    let io = TokioIo::new(stream);

    // Called once per request on the connection, not once per connection.
    let svc = service_fn(move |req| {
        let handler = handler.clone();
        async move { dispatch(handler, req, peer, timeouts).await }
    });

    // `auto::Builder` serves HTTP/1.1 and HTTP/2, whatever the client speaks.
    let mut builder = ConnBuilder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(timeouts.read);

    let conn = builder.serve_connection(io, svc);
    tokio::pin!(conn);

    let mut closing = false;
    loop {
        tokio::select! {
            res = conn.as_mut() => {
                if let Err(e) = res {
                    debug!(peer = %peer, "connection error: {e}");
                }
                break;
            }
            () = draining.cancelled(), if !closing => {
                closing = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Hot path: collect the body, run the chain, convert the response.
///
/// Failures are answered with a status code, so hyper never sees an error.
async fn dispatch(
    handler: BoxedHandler,
    req: hyper::Request<Incoming>,
    peer: SocketAddr,
    timeouts: Timeouts,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match tokio::time::timeout(timeouts.read, body.collect()).await {
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(e)) => {
            debug!(peer = %peer, "failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
        Err(_) => {
            debug!(peer = %peer, timeout = ?timeouts.read, "request body not received in time");
            return Ok(Response::status(StatusCode::REQUEST_TIMEOUT).into_inner());
        }
    };

    let call = handler.call(Request::new(parts, body, peer));
    let response = match tokio::time::timeout(timeouts.write, call).await {
        Ok(res) => res,
        Err(_) => {
            warn!(peer = %peer, timeout = ?timeouts.write, "no response within write timeout");
            Response::status(StatusCode::GATEWAY_TIMEOUT)
        }
    };

    Ok(response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first termination signal the process receives, or never
/// when signal handling is disabled.
///
/// On Unix this listens for both SIGTERM (process supervisors, Kubernetes)
/// and SIGINT (Ctrl-C). On Windows only Ctrl-C is available.
async fn shutdown_signal(enabled: bool) {
    if !enabled {
        return std::future::pending().await;
    }

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
