//! Error types for the forwarding engine.

use std::time::Duration;

use thiserror::Error;

use crate::runtime::RuntimeError;

/// Result type for forwarding operations.
pub type Result<T> = std::result::Result<T, ForwardError>;

/// Errors surfaced by the forwarding engine.
///
/// Spec and resolution errors are produced before any container exists;
/// the remaining variants flow out of running generations.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The forwarding string matches none of the supported forms.
    #[error("malformed forwarding spec '{spec}'")]
    MalformedSpec { spec: String },

    #[error("invalid local port '{port}' in forwarding spec '{spec}'")]
    BadLocalPort { spec: String, port: String },

    #[error("invalid remote port '{port}' in forwarding spec '{spec}'")]
    BadRemotePort { spec: String, port: String },

    #[error("missing remote host in forwarding spec '{spec}'")]
    BadRemoteHost { spec: String },

    /// The implicit-remote-host forms need a target with exactly one IP.
    #[error("target has multiple network attachments; name the remote host explicitly")]
    AmbiguousTarget,

    #[error("target has no usable IP address on any network attachment")]
    NoAddress,

    /// A proxy container stopped on its own.
    #[error("forwarder container '{id}' exited unexpectedly with status {status}")]
    ProxyExited { id: String, status: i64 },

    #[error("target {target} is not running after {timeout:?}")]
    TargetNotRunning { target: String, timeout: Duration },

    /// Aggregated generation failure; per-forwarder causes are logged.
    #[error("one or more forwarders failed")]
    ForwardersFailed,

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
