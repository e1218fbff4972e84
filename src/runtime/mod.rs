//! Container-runtime collaborator.
//!
//! The forwarding engine consumes a deliberately small slice of the runtime:
//! inspect a container, create/start a proxy container, wait until a
//! container leaves the running state, and kill/remove it again, plus an
//! image pull. [`ContainerRuntime`] captures that contract as a trait so the
//! engine can be driven end-to-end without a daemon; [`DockerRuntime`] is the
//! bollard-backed implementation the binary uses.

mod docker;
mod error;

use std::collections::BTreeMap;

use async_trait::async_trait;

pub use docker::DockerRuntime;
pub use error::{Result, RuntimeError};

/// Point-in-time view of a container, taken via inspect.
#[derive(Debug, Clone, Default)]
pub struct ContainerDetails {
    pub id: String,
    /// Container name, without the leading slash the daemon reports.
    pub name: String,
    pub running: bool,
    /// Network attachments keyed by network name.
    pub networks: BTreeMap<String, Endpoint>,
    /// Published TCP ports: container port to host bindings.
    pub ports: BTreeMap<u16, Vec<HostBinding>>,
}

/// One network attachment of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub ip: String,
    pub aliases: Vec<String>,
}

/// One host-side binding of a published container port.
#[derive(Debug, Clone)]
pub struct HostBinding {
    pub host_ip: String,
    pub host_port: String,
}

/// Creation parameters for a proxy container.
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    pub name: String,
    pub image: String,
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
    /// Container-side TCP ports to expose.
    pub exposed_ports: Vec<u16>,
    /// `(container port, host ip, host port)`; a `None` host port lets the
    /// daemon pick one.
    pub port_bindings: Vec<(u16, String, Option<u16>)>,
    /// Docker network-mode string: a network name or `container:<id>`.
    pub network_mode: String,
    pub auto_remove: bool,
}

/// The exact set of runtime operations the forwarding engine relies on.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Inspect a container by name or id.
    async fn inspect(&self, container: &str) -> Result<ContainerDetails>;

    /// Create a container, returning its id.
    async fn create(&self, opts: CreateOpts) -> Result<String>;

    async fn start(&self, id: &str) -> Result<()>;

    /// Resolve with the exit status once the container leaves the running
    /// state. An `Err` means the wait call itself failed, not that the
    /// container exited abnormally.
    async fn wait_not_running(&self, id: &str) -> Result<i64>;

    async fn kill(&self, id: &str, signal: &str) -> Result<()>;

    async fn remove(&self, id: &str, force: bool) -> Result<()>;

    /// Pull `image` unless it is already present locally.
    async fn pull_image(&self, image: &str) -> Result<()>;
}
