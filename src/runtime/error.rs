//! Error types for the container-runtime collaborator.

use thiserror::Error;

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors surfaced by the container runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("cannot initialize Docker client: {reason}")]
    Connect {
        /// Why the daemon is unreachable.
        reason: String,
    },

    #[error("cannot inspect container '{container}': {reason}")]
    Inspect { container: String, reason: String },

    #[error("cannot pull image '{image}': {reason}")]
    ImagePull { image: String, reason: String },

    #[error("cannot create container '{name}': {reason}")]
    Create { name: String, reason: String },

    #[error("cannot start container '{id}': {reason}")]
    Start { id: String, reason: String },

    #[error("waiting for container '{id}' failed: {reason}")]
    Wait { id: String, reason: String },

    #[error("cannot kill container '{id}': {reason}")]
    Kill { id: String, reason: String },

    #[error("cannot remove container '{id}': {reason}")]
    Remove { id: String, reason: String },
}
