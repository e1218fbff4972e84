//! One generation: every forwarding started concurrently, failures
//! aggregated, everything torn down together.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::forward::config::ForwardConfig;
use crate::forward::error::{ForwardError, Result};
use crate::forward::plan::ForwardingPlan;
use crate::forward::{direct, sidecar};
use crate::runtime::ContainerRuntime;

/// Run every plan of one generation to completion.
///
/// All forwarders are spawned before any is joined. The first failure
/// cancels `cancel`, so sibling forwarders tear down before this returns;
/// forwarders ending because of the cancellation report `Ok`. Any recorded
/// failure collapses into the single aggregated error.
pub async fn run_generation(
    runtime: Arc<dyn ContainerRuntime>,
    config: ForwardConfig,
    plans: Vec<ForwardingPlan>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut tasks = JoinSet::new();
    for plan in plans {
        let runtime = runtime.clone();
        let config = config.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            match plan {
                ForwardingPlan::Direct(plan) => {
                    let label = format!("{}:{}", plan.remote_host, plan.remote_port);
                    (label, direct::run(runtime, config, plan, cancel).await)
                }
                ForwardingPlan::Sidecar(plan) => {
                    let label = format!("{}:{}", plan.remote_host, plan.remote_port);
                    (label, sidecar::run(runtime, config, plan, cancel).await)
                }
            }
        });
    }

    let mut failed = false;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((label, Err(err))) => {
                tracing::error!("forwarding to {} failed: {}", label, err);
                failed = true;
                cancel.cancel();
            }
            Err(err) => {
                if err.is_panic() {
                    tracing::error!("forwarder task panicked: {}", err);
                } else {
                    tracing::error!("forwarder task cancelled: {}", err);
                }
                failed = true;
                cancel.cancel();
            }
        }
    }

    if failed {
        Err(ForwardError::ForwardersFailed)
    } else {
        Ok(())
    }
}
