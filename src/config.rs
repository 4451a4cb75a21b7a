//! Gateway configuration.

use std::fmt::Display;
use std::time::Duration;

use crate::error::Error;

/// Default bind address.
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
/// Default read timeout (request headers and body).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
/// Default write timeout (time for the chain to produce a response).
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);
/// Default drain window for explicit shutdown and OS signals.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
/// Default drain window when the external cancellation token fires.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(2);

/// Everything a [`Gateway`](crate::Gateway) needs to start.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// `host:port` to listen on. Port `0` picks a free port.
    pub addr: String,
    /// `|`-separated capability tokens, outermost first.
    pub mode: String,
    /// Bound on reading request headers, and separately on collecting the body.
    pub read_timeout: Duration,
    /// Bound on the chain producing a response; exceeded → `504`.
    pub write_timeout: Duration,
    /// Drain window for [`Gateway::shutdown`](crate::Gateway::shutdown) and OS signals.
    pub shutdown_grace: Duration,
    /// Drain window used when the external cancellation token fires.
    pub cancel_grace: Duration,
    /// Whether SIGTERM / SIGINT (Ctrl-C on Windows) trigger a drain.
    pub handle_signals: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_owned(),
            mode: String::new(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            cancel_grace: DEFAULT_CANCEL_GRACE,
            handle_signals: true,
        }
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen on every interface at `port`.
    #[must_use]
    pub fn for_port(port: impl Display) -> Self {
        Self::default().with_addr(format!("0.0.0.0:{port}"))
    }

    #[must_use]
    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    #[must_use]
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    #[must_use]
    pub fn with_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Checks the configuration before any socket is touched.
    pub fn validate(&self) -> Result<(), Error> {
        if self.addr.trim().is_empty() {
            return Err(Error::InvalidConfig("bind address is empty".into()));
        }
        let durations = [
            ("read_timeout", self.read_timeout),
            ("write_timeout", self.write_timeout),
            ("shutdown_grace", self.shutdown_grace),
            ("cancel_grace", self.cancel_grace),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(Error::InvalidConfig(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}
