//! Incoming HTTP request type.

use std::net::SocketAddr;

use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, Uri};

/// An incoming HTTP request with its body fully collected.
///
/// The gateway reads the whole body (bounded by the read timeout) before the
/// chain runs, so capabilities can inspect it and the terminal handler can
/// forward it without touching hyper's streaming types.
pub struct Request {
    parts: Parts,
    body: Bytes,
    remote_addr: SocketAddr,
}

impl Request {
    pub(crate) fn new(parts: Parts, body: Bytes, remote_addr: SocketAddr) -> Self {
        Self { parts, body, remote_addr }
    }

    /// Wraps an [`http::Request`], e.g. to drive a chain without a socket.
    pub fn from_http(req: http::Request<Bytes>, remote_addr: SocketAddr) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body, remote_addr)
    }

    /// Unwraps into an [`http::Request`] for forwarding to a backend.
    pub fn into_http(self) -> http::Request<Bytes> {
        http::Request::from_parts(self.parts, self.body)
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn remote_addr(&self) -> SocketAddr { self.remote_addr }

    /// Case-insensitive header lookup. Non-UTF-8 values are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Mutable access to the headers, for capabilities that annotate the
    /// request before passing it inward.
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.parts.headers }
}
