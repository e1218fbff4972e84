//! The sidecar strategy: reach endpoints only visible inside the target's
//! network namespace.
//!
//! Two containers per forwarding. The inner proxy shares the target's
//! namespace (`container:<id>` network mode) and relays a candidate port to
//! the requested endpoint; the outer leg is an ordinary direct relay from
//! the host to `target_host:candidate`. Both are owned here and torn down
//! through a single entry point.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::forward::config::ForwardConfig;
use crate::forward::direct::{DirectForwarder, best_effort_remove};
use crate::forward::error::{ForwardError, Result};
use crate::forward::plan::{DirectPlan, SidecarPlan};
use crate::runtime::{ContainerRuntime, CreateOpts};
use crate::util::name_suffix;

pub struct SidecarForwarder {
    runtime: Arc<dyn ContainerRuntime>,
    cleanup_timeout: Duration,
    inner_id: String,
    outer: DirectForwarder,
    /// Port the inner proxy listens on inside the target's namespace. Drawn
    /// from the configured range; not checked against the target's own
    /// listeners.
    pub sidecar_port: u16,
}

impl SidecarForwarder {
    pub async fn start(
        runtime: Arc<dyn ContainerRuntime>,
        config: &ForwardConfig,
        plan: &SidecarPlan,
    ) -> Result<Self> {
        let sidecar_port = config.draw_sidecar_port();

        let opts = CreateOpts {
            name: format!("portward-sidecar-{}", name_suffix()),
            image: config.image.clone(),
            entrypoint: vec!["socat".to_string()],
            cmd: vec![
                format!("TCP-LISTEN:{sidecar_port},fork"),
                format!("TCP-CONNECT:{}:{}", plan.remote_host, plan.remote_port),
            ],
            exposed_ports: Vec::new(),
            port_bindings: Vec::new(),
            network_mode: format!("container:{}", plan.target_id),
            auto_remove: true,
        };

        let inner_id = runtime.create(opts).await?;
        if let Err(err) = runtime.start(&inner_id).await {
            best_effort_remove(&*runtime, &inner_id, config.cleanup_timeout).await;
            return Err(err.into());
        }

        // Outer leg: a direct forwarding into the target's externally
        // visible IP, pointed at the inner proxy.
        let outer_plan = DirectPlan {
            local_host: plan.local_host.clone(),
            local_port: plan.local_port,
            remote_host: plan.target_host.clone(),
            remote_ip: plan.target_host.clone(),
            remote_port: sidecar_port,
            network: plan.network.clone(),
        };
        let outer = match DirectForwarder::start(runtime.clone(), config, &outer_plan).await {
            Ok(outer) => outer,
            Err(err) => {
                best_effort_remove(&*runtime, &inner_id, config.cleanup_timeout).await;
                return Err(err);
            }
        };

        Ok(Self {
            runtime,
            cleanup_timeout: config.cleanup_timeout,
            inner_id,
            outer,
            sidecar_port,
        })
    }

    /// Host-side `host:port` the outer leg bound.
    pub fn local(&self) -> &str {
        &self.outer.local
    }

    /// Block until cancellation or until either proxy dies. Both containers
    /// are gone in every exit path.
    pub async fn supervise(&self, cancel: &CancellationToken) -> Result<()> {
        let result = tokio::select! {
            _ = cancel.cancelled() => Ok(()),
            status = self.runtime.wait_not_running(&self.inner_id) => match status {
                Ok(status) => Err(ForwardError::ProxyExited {
                    id: self.inner_id.clone(),
                    status,
                }),
                Err(err) => Err(err.into()),
            },
            status = self.outer.wait() => match status {
                Ok(status) => Err(ForwardError::ProxyExited {
                    id: self.outer.container_id().to_string(),
                    status,
                }),
                Err(err) => Err(err.into()),
            },
        };
        self.teardown().await;
        result
    }

    /// Single teardown entry point for both containers.
    pub async fn teardown(&self) {
        tokio::join!(
            best_effort_remove(&*self.runtime, &self.inner_id, self.cleanup_timeout),
            self.outer.teardown(),
        );
    }
}

/// Task body for one sidecar forwarding.
pub async fn run(
    runtime: Arc<dyn ContainerRuntime>,
    config: ForwardConfig,
    plan: SidecarPlan,
    cancel: CancellationToken,
) -> Result<()> {
    let forwarder = SidecarForwarder::start(runtime, &config, &plan).await?;
    println!(
        "Forwarding {} to {}:{} through {}:{}",
        forwarder.local(),
        plan.remote_host,
        plan.remote_port,
        plan.target_host,
        forwarder.sidecar_port,
    );
    forwarder.supervise(&cancel).await
}
