//! Minimal portico gateway with an echo handler standing in for the proxy.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example gateway -- --port 3000 --mode 'trace|authz'
//!
//! Try:
//!   curl -i http://localhost:3000/orders                          # 401
//!   curl -i -H 'authorization: Bearer x' http://localhost:3000/orders
//!
//! Ctrl-C (or SIGTERM) drains in-flight requests for `--grace` seconds.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use portico::{Gateway, GatewayConfig, Request, Response};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Run a portico gateway in front of an echo handler")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// `|`-separated capability tokens, outermost first.
    #[arg(long, default_value = "trace|authz")]
    mode: String,

    /// Drain window on Ctrl-C / SIGTERM, in seconds.
    #[arg(long, default_value_t = 10)]
    grace: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = GatewayConfig::for_port(args.port)
        .with_mode(args.mode)
        .with_shutdown_grace(Duration::from_secs(args.grace));

    let gateway = Gateway::default();
    match gateway.start(CancellationToken::new(), config, echo).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = e.as_label(), "gateway failed: {e}");
            ExitCode::FAILURE
        }
    }
}

// The terminal handler. A real deployment forwards `req.into_http()` to a
// backend and wraps the answer with `Response::from_http`.
async fn echo(req: Request) -> Response {
    Response::text(format!("{} {} ({} bytes)\n", req.method(), req.uri(), req.body().len()))
}
