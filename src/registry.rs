//! Capability registry: mode token → handler transformer.
//!
//! Populated once at startup, then handed to a [`Gateway`](crate::Gateway)
//! which only ever reads from it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::middleware::{Authz, Middleware, Trace};

/// Token of the built-in authorization capability.
pub const AUTHZ: &str = "authz";
/// Token of the built-in request tracing capability.
pub const TRACE: &str = "trace";

/// Named capabilities that a mode specification may reference.
///
/// Tokens are case-sensitive and matched exactly. Each token maps to exactly
/// one capability: registering the same token twice is refused.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    entries: HashMap<String, Arc<dyn Middleware>>,
}

impl CapabilityRegistry {
    /// An empty registry. Only the empty mode specification resolves against it.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in capabilities: `authz` (default [`Authz`] policy) and
    /// `trace`.
    pub fn with_defaults() -> Self {
        Self::new().on(AUTHZ, Authz::default()).on(TRACE, Trace)
    }

    /// Registers `middleware` under `token`.
    pub fn register(
        &mut self,
        token: impl Into<String>,
        middleware: impl Middleware,
    ) -> Result<(), Error> {
        let token = token.into();
        if self.entries.contains_key(&token) {
            return Err(Error::DuplicateCapability(token));
        }
        self.entries.insert(token, Arc::new(middleware));
        Ok(())
    }

    /// Chaining form of [`register`](Self::register).
    ///
    /// # Panics
    ///
    /// Panics if `token` is already registered.
    pub fn on(mut self, token: &str, middleware: impl Middleware) -> Self {
        self.register(token, middleware)
            .unwrap_or_else(|e| panic!("invalid capability registration: {e}"));
        self
    }

    /// Looks up the capability registered under `token`.
    pub fn resolve(&self, token: &str) -> Result<Arc<dyn Middleware>, Error> {
        self.entries
            .get(token)
            .map(Arc::clone)
            .ok_or_else(|| Error::UnknownMode {
                token: token.to_owned(),
                known: self.tokens().join(", "),
            })
    }

    /// Whether `token` names a registered capability. Case-sensitive, like
    /// [`resolve`](Self::resolve).
    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    /// Registered tokens, sorted.
    pub fn tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry").field("tokens", &self.tokens()).finish()
    }
}
