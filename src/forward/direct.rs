//! The direct strategy: one relay container on the target's network.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::forward::config::ForwardConfig;
use crate::forward::error::{ForwardError, Result};
use crate::forward::plan::DirectPlan;
use crate::runtime::{ContainerRuntime, CreateOpts};
use crate::util::name_suffix;

/// Host-port placeholder when the daemon reports no binding.
const UNKNOWN_PORT: &str = "<unknown>";

/// One running relay container publishing a host port and connecting to the
/// plan's remote endpoint.
pub struct DirectForwarder {
    runtime: Arc<dyn ContainerRuntime>,
    cleanup_timeout: Duration,
    container_id: String,
    /// `host:port` actually bound on the host side.
    pub local: String,
}

impl DirectForwarder {
    /// Create and start the relay. When the local port is daemon-assigned,
    /// the started container is inspected once to read the binding back.
    pub async fn start(
        runtime: Arc<dyn ContainerRuntime>,
        config: &ForwardConfig,
        plan: &DirectPlan,
    ) -> Result<Self> {
        let opts = CreateOpts {
            name: format!("portward-fwd-{}", name_suffix()),
            image: config.image.clone(),
            entrypoint: vec!["socat".to_string()],
            cmd: vec![
                format!("TCP-LISTEN:{},fork", plan.remote_port),
                format!("TCP-CONNECT:{}:{}", plan.remote_ip, plan.remote_port),
            ],
            exposed_ports: vec![plan.remote_port],
            port_bindings: vec![(plan.remote_port, plan.local_host.clone(), plan.local_port)],
            network_mode: plan.network.clone(),
            auto_remove: true,
        };

        let container_id = runtime.create(opts).await?;
        let mut forwarder = Self {
            runtime,
            cleanup_timeout: config.cleanup_timeout,
            container_id,
            local: String::new(),
        };
        if let Err(err) = forwarder.bring_up(plan).await {
            forwarder.teardown().await;
            return Err(err);
        }
        Ok(forwarder)
    }

    async fn bring_up(&mut self, plan: &DirectPlan) -> Result<()> {
        self.runtime.start(&self.container_id).await?;
        self.local = match plan.local_port {
            Some(port) => format!("{}:{}", plan.local_host, port),
            None => {
                let port = self.bound_host_port(plan.remote_port).await?;
                format!("{}:{}", plan.local_host, port)
            }
        };
        Ok(())
    }

    /// Read the daemon-assigned host port back from the published bindings.
    async fn bound_host_port(&self, container_port: u16) -> Result<String> {
        let details = self.runtime.inspect(&self.container_id).await?;
        let bound = details
            .ports
            .get(&container_port)
            .and_then(|bindings| bindings.iter().find(|binding| !binding.host_port.is_empty()))
            .map(|binding| binding.host_port.clone());
        Ok(bound.unwrap_or_else(|| {
            tracing::warn!(
                "container '{}' reports no host binding for port {}",
                self.container_id,
                container_port
            );
            UNKNOWN_PORT.to_string()
        }))
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// The relay's wait-not-running signal, for composition.
    pub async fn wait(&self) -> crate::runtime::Result<i64> {
        self.runtime.wait_not_running(&self.container_id).await
    }

    /// Block until cancellation or until the relay dies; the container is
    /// gone in every exit path.
    pub async fn supervise(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => {
                self.teardown().await;
                Ok(())
            }
            status = self.wait() => match status {
                Ok(status) => {
                    self.teardown().await;
                    Err(ForwardError::ProxyExited {
                        id: self.container_id.clone(),
                        status,
                    })
                }
                Err(err) => {
                    self.kill_best_effort().await;
                    Err(err.into())
                }
            },
        }
    }

    /// Bounded, best-effort removal. Failures are logged; the daemon's
    /// auto-remove is the backstop.
    pub async fn teardown(&self) {
        best_effort_remove(&*self.runtime, &self.container_id, self.cleanup_timeout).await;
    }

    async fn kill_best_effort(&self) {
        match timeout(
            self.cleanup_timeout,
            self.runtime.kill(&self.container_id, "KILL"),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(
                    "cannot kill forwarder container '{}': {}",
                    self.container_id,
                    err
                );
            }
            Err(_) => {
                tracing::warn!("killing forwarder container '{}' timed out", self.container_id);
            }
        }
    }
}

/// Force-remove `id`, bounded by `bound`; never fails the caller.
pub(crate) async fn best_effort_remove(runtime: &dyn ContainerRuntime, id: &str, bound: Duration) {
    match timeout(bound, runtime.remove(id, true)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!("cannot remove forwarder container '{}': {}", id, err),
        Err(_) => tracing::warn!("removing forwarder container '{}' timed out", id),
    }
}

/// Task body for one direct forwarding: bring the relay up, announce it,
/// then supervise until the generation ends.
pub async fn run(
    runtime: Arc<dyn ContainerRuntime>,
    config: ForwardConfig,
    plan: DirectPlan,
    cancel: CancellationToken,
) -> Result<()> {
    let forwarder = DirectForwarder::start(runtime, &config, &plan).await?;
    println!(
        "Forwarding {} to {}:{}",
        forwarder.local, plan.remote_host, plan.remote_port
    );
    forwarder.supervise(&cancel).await
}
