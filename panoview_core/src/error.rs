//! Error types for the PanoView presentation protocol.

use panoview_env::EnvError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the core engines.
///
/// None of these are fatal to a running cluster: the coordinator and the
/// renderers convert them into degraded-but-visible state (an error message
/// scene, an empty manifest) instead of stalling a transition.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Asset path could not be resolved against the search paths
    #[error("cannot open {0}")]
    ResourceNotFound(String),

    /// A `data:` URL was malformed
    #[error("invalid data url: {0}")]
    InvalidDataUrl(String),

    /// The rendering backend failed to decode an asset
    #[error("failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    /// A manifest file was not valid JSON of the expected shape
    #[error("manifest {path:?} is invalid: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A wire message could not be encoded or decoded
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No handler is registered for the topic
    #[error("unknown topic '{0}'")]
    UnknownTopic(String),

    /// Arguments for a topic were missing or of the wrong type
    #[error("invalid arguments for '{topic}': {reason}")]
    InvalidArgument { topic: String, reason: String },

    /// Configuration was rejected by validation
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transport-level failure
    #[error(transparent)]
    Env(#[from] EnvError),
}

impl CoreError {
    /// Creates an invalid-argument error.
    pub fn invalid_argument(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }
}

/// Convenience result alias.
pub type CoreResult<T> = Result<T, CoreError>;
