use std::io;
use std::net::{IpAddr, SocketAddr};

/// Errors that can occur while running the approval bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The bridge may only listen on a loopback address.
    #[error("approval bridge must bind to a loopback address, got {0}")]
    NonLoopback(IpAddr),

    /// Binding the listener failed.
    #[error("failed to bind approval bridge on {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The server stopped with an error.
    #[error("approval bridge server error: {0}")]
    Serve(#[from] io::Error),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
