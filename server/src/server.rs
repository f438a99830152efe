//! TCP accept loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use dth_resolver::ProjectResolver;

use crate::connection;
use crate::protocol::ProtocolManager;
use crate::registry::ContextRegistry;

/// The process-wide server: one shared context registry and protocol
/// negotiator, one connection task per accepted client.
pub struct Server {
    host_name: String,
    registry: Arc<ContextRegistry>,
    protocol: Arc<ProtocolManager>,
}

impl Server {
    #[must_use]
    pub fn new(host_name: String, resolver: Arc<dyn ProjectResolver>) -> Self {
        let protocol = Arc::new(ProtocolManager::new());
        let registry = Arc::new(ContextRegistry::new(resolver, Arc::clone(&protocol)));
        Self {
            host_name,
            registry,
            protocol,
        }
    }

    /// Bind the loopback interface and accept clients forever.
    pub async fn run(&self, port: u16) -> Result<()> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("binding 127.0.0.1:{port}"))?;
        self.serve(listener).await
    }

    /// Accept loop over an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr().context("reading bound address")?;
        tracing::info!(
            pid = std::process::id(),
            address = %local_addr,
            "listening for design-time clients"
        );

        loop {
            let (stream, peer) = listener.accept().await.context("accepting connection")?;
            tracing::info!(%peer, "client connected");

            let host_name = self.host_name.clone();
            let registry = Arc::clone(&self.registry);
            let protocol = Arc::clone(&self.protocol);
            tokio::spawn(async move {
                if let Err(error) = connection::run(stream, host_name, registry, protocol).await {
                    tracing::warn!(%peer, error = %error, "connection closed with error");
                }
            });
        }
    }
}
