//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use portico::{Error, Gateway, GatewayConfig, Handler};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Loopback, ephemeral port, no OS signal handling.
pub fn config() -> GatewayConfig {
    GatewayConfig::new().with_addr("127.0.0.1:0").with_signals(false)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A gateway running on a background task.
pub struct Running {
    pub gateway: Gateway,
    pub cancel: CancellationToken,
    pub addr: SocketAddr,
    pub task: JoinHandle<Result<(), Error>>,
}

impl Running {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Starts `gateway` and waits until it is accepting connections.
pub async fn spawn(gateway: Gateway, config: GatewayConfig, terminal: impl Handler) -> Running {
    init_tracing();
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let (gateway, cancel) = (gateway.clone(), cancel.clone());
        async move { gateway.start(cancel, config, terminal).await }
    });
    let addr = gateway.serving().await.expect("gateway did not reach Serving");
    Running { gateway, cancel, addr, task }
}
