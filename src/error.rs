//! Unified error type.

use thiserror::Error;

/// The error type returned by portico's fallible operations.
///
/// Request-level failures (rejected authorization, handler timeouts) are
/// expressed as HTTP [`Response`](crate::Response) values, not as `Error`s.
/// This type surfaces the failures that stop a gateway from serving at all:
/// a bad mode specification, a bad configuration, or a port that cannot be bound.
///
/// Draining past the grace period and repeated shutdown requests are not
/// errors. They are logged and absorbed by the lifecycle.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// A mode token has no registered capability.
    #[error("unknown mode `{token}` (registered: {known})")]
    UnknownMode {
        /// The token as it appeared in the mode specification.
        token: String,
        /// Comma-separated list of registered tokens.
        known: String,
    },

    /// A capability token was registered twice.
    #[error("capability `{0}` is already registered")]
    DuplicateCapability(String),

    /// The gateway configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The listening socket could not be opened.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The configured bind address.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// `start` was called while the gateway was already running.
    #[error("gateway is already running")]
    AlreadyRunning,
}

impl Error {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::UnknownMode { .. } => "unknown_mode",
            Error::DuplicateCapability(_) => "duplicate_capability",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Bind { .. } => "bind",
            Error::AlreadyRunning => "already_running",
        }
    }

    /// Configuration errors are detected before any socket is opened.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnknownMode { .. } | Error::DuplicateCapability(_) | Error::InvalidConfig(_)
        )
    }
}
