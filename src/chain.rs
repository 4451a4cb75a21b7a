//! Chain builder: mode specification → composed handler.
//!
//! A mode specification is a `|`-separated list of capability tokens, e.g.
//! `"trace|authz"`. The first token is the outermost layer: it sees the
//! request first on the way in and the response last on the way out.
//!
//! ```text
//! "trace|authz"  →  trace( authz( terminal ) )
//!
//!   request  ──▶ trace ──▶ authz ──▶ terminal
//!   response ◀── trace ◀── authz ◀──┘
//! ```

use tracing::debug;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::registry::CapabilityRegistry;

/// Separator between tokens in a mode specification.
pub const MODE_DELIMITER: char = '|';

/// Splits a mode specification into tokens, outermost first.
///
/// The empty specification has no tokens. Anything else is split verbatim:
/// no trimming, so `"authz|"` yields `["authz", ""]`.
pub fn parse_modes(spec: &str) -> Vec<&str> {
    if spec.is_empty() {
        return Vec::new();
    }
    spec.split(MODE_DELIMITER).collect()
}

/// Composes the capabilities named in `spec` around `terminal`.
///
/// Every token is resolved before any layer is built, so an unknown token
/// fails the whole build and nothing partial escapes.
pub fn build(
    spec: &str,
    registry: &CapabilityRegistry,
    terminal: impl Handler,
) -> Result<BoxedHandler, Error> {
    let tokens = parse_modes(spec);
    let layers = tokens
        .iter()
        .map(|token| registry.resolve(token))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(modes = ?tokens, "composing handler chain");

    // Innermost first, so the accumulator's outer layer ends up being tokens[0].
    let handler = layers
        .iter()
        .rev()
        .fold(terminal.into_boxed_handler(), |inner, layer| layer.wrap(inner));
    Ok(handler)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::middleware::{self, Next};
    use crate::request::Request;

    type Log = Arc<Mutex<Vec<String>>>;

    fn request() -> Request {
        let req = http::Request::builder().uri("/").body(Bytes::new()).unwrap();
        Request::from_http(req, "127.0.0.1:9".parse().unwrap())
    }

    fn recording(name: &'static str, log: &Log) -> impl middleware::Middleware {
        let log = Arc::clone(log);
        middleware::from_fn(move |req: Request, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{name}:in"));
                let res = next.run(req).await;
                log.lock().unwrap().push(format!("{name}:out"));
                res
            }
        })
    }

    fn terminal(log: &Log) -> impl Handler {
        let log = Arc::clone(log);
        move |_req: Request| {
            log.lock().unwrap().push("terminal".to_owned());
            async { StatusCode::OK }
        }
    }

    fn registry(log: &Log) -> CapabilityRegistry {
        CapabilityRegistry::new()
            .on("a", recording("a", log))
            .on("b", recording("b", log))
            .on("c", recording("c", log))
    }

    #[test]
    fn parse_keeps_empty_tokens_and_whitespace() {
        assert!(parse_modes("").is_empty());
        assert_eq!(parse_modes("authz"), vec!["authz"]);
        assert_eq!(parse_modes("authz|"), vec!["authz", ""]);
        assert_eq!(parse_modes("a| b"), vec!["a", " b"]);
    }

    #[tokio::test]
    async fn first_token_is_outermost() {
        let log = Log::default();
        let handler = build("a|b|c", &registry(&log), terminal(&log)).unwrap();

        let res = handler.call(request()).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:in", "b:in", "c:in", "terminal", "c:out", "b:out", "a:out"]
        );
    }

    #[tokio::test]
    async fn order_follows_declaration_not_registration() {
        let log = Log::default();
        let handler = build("c|a", &registry(&log), terminal(&log)).unwrap();

        handler.call(request()).await;
        assert_eq!(*log.lock().unwrap(), vec!["c:in", "a:in", "terminal", "a:out", "c:out"]);
    }

    #[tokio::test]
    async fn same_token_may_repeat() {
        let log = Log::default();
        let handler = build("a|a", &registry(&log), terminal(&log)).unwrap();

        handler.call(request()).await;
        assert_eq!(*log.lock().unwrap(), vec!["a:in", "a:in", "terminal", "a:out", "a:out"]);
    }

    #[tokio::test]
    async fn empty_mode_is_the_terminal_alone() {
        // An empty registry proves no token was resolved.
        let log = Log::default();
        let handler = build("", &CapabilityRegistry::new(), terminal(&log)).unwrap();

        let res = handler.call(request()).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["terminal"]);
    }

    #[test]
    fn unknown_token_fails_the_build() {
        let log = Log::default();
        let err = build("a|bogus|c", &registry(&log), terminal(&log)).unwrap_err();
        assert!(matches!(err, Error::UnknownMode { ref token, .. } if token == "bogus"));
    }

    #[test]
    fn trailing_delimiter_is_an_unknown_empty_token() {
        let log = Log::default();
        let err = build("a|", &registry(&log), terminal(&log)).unwrap_err();
        assert!(matches!(err, Error::UnknownMode { ref token, .. } if token.is_empty()));
    }
}
