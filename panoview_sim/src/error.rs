//! Error types for the simulation harness.

use panoview_core::CoreError;
use thiserror::Error;

/// Errors raised while setting up or driving a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// Coordinator or renderer setup failed
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Scratch asset directory could not be prepared
    #[error("asset setup failed: {0}")]
    Io(#[from] std::io::Error),

    /// The async runtime could not be built
    #[error("runtime error: {0}")]
    Runtime(String),
}
