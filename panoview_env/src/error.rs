//! Errors raised by cluster transports.

use thiserror::Error;

/// A transport operation could not be carried out.
///
/// Transport failures never stop a show: the coordinator and the renderer
/// nodes log them and carry on with whatever nodes are still reachable.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The channel to or from a node is closed or refused the message
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The renderer is not (or no longer) registered with the transport
    #[error("Node unreachable: {0}")]
    NodeUnreachable(String),
}

impl EnvError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Error for a renderer that left or never joined.
    pub fn unreachable(node: impl std::fmt::Display) -> Self {
        Self::NodeUnreachable(node.to_string())
    }
}
