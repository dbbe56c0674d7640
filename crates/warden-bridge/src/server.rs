//! Loopback listener for the approval bridge.

use std::io;
use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use warden_approval::ApprovalGate;

use crate::error::{BridgeError, BridgeResult};
use crate::routes::{PERMISSION_PATH, router};

/// A running approval bridge.
///
/// Only ever bound to a loopback address; the URL is handed to sandboxed
/// tool processes through their environment.
#[derive(Debug)]
pub struct ApprovalBridge {
    gate: ApprovalGate,
    addr: SocketAddr,
    shutdown: CancellationToken,
    server: JoinHandle<io::Result<()>>,
}

impl ApprovalBridge {
    /// Bind on `host:port` (port `0` picks an ephemeral port) and start
    /// serving.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NonLoopback`] if `host` is not a loopback
    /// address, or [`BridgeError::Bind`] if the listener cannot be bound.
    pub async fn bind(gate: ApprovalGate, host: IpAddr, port: u16) -> BridgeResult<Self> {
        if !host.is_loopback() {
            return Err(BridgeError::NonLoopback(host));
        }
        let requested = SocketAddr::new(host, port);
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|source| BridgeError::Bind {
                addr: requested,
                source,
            })?;
        let addr = listener
            .local_addr()
            .map_err(|source| BridgeError::Bind {
                addr: requested,
                source,
            })?;

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let app = router(gate.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        info!(%addr, "approval bridge listening");
        Ok(Self {
            gate,
            addr,
            shutdown,
            server,
        })
    }

    /// Address the bridge is listening on.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Full URL of the permission endpoint.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}{PERMISSION_PATH}", self.addr)
    }

    /// Deny every pending approval, then stop the listener.
    ///
    /// Returns how many pending approvals were drained.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Serve`] if the server task failed.
    pub async fn shutdown(self) -> BridgeResult<usize> {
        let drained = self.gate.shutdown().await;
        self.shutdown.cancel();
        match self.server.await {
            Ok(result) => result?,
            Err(e) => {
                warn!(error = %e, "approval bridge task ended abnormally");
                return Err(BridgeError::Serve(io::Error::other(e)));
            },
        }
        info!(addr = %self.addr, drained, "approval bridge stopped");
        Ok(drained)
    }
}
