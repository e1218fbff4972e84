//! The target lifecycle loop: generations, restarts, graceful shutdown.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::forward::config::ForwardConfig;
use crate::forward::error::{ForwardError, Result};
use crate::forward::plan::{self, ForwardingPlan};
use crate::forward::spec::ForwardingSpec;
use crate::forward::supervisor;
use crate::forward::target::Target;
use crate::runtime::ContainerRuntime;

/// One `portward` invocation: a target reference, the forwarding specs, and
/// the loop that keeps them alive across target restarts.
///
/// Generations are strictly sequential: a new one starts only after the
/// previous one's teardown has been awaited, so two generations' proxy
/// containers never coexist.
pub struct ForwardSession {
    runtime: Arc<dyn ContainerRuntime>,
    config: ForwardConfig,
    target_ref: String,
    forwardings: Vec<String>,
}

impl ForwardSession {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        config: ForwardConfig,
        target_ref: impl Into<String>,
        forwardings: Vec<String>,
    ) -> Self {
        Self {
            runtime,
            config,
            target_ref: target_ref.into(),
            forwardings,
        }
    }

    /// Drive forwarding until the target goes away for good, a forwarder
    /// fails, or `cancel` fires (graceful, exit code zero).
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let Some(mut target) = self.acquire_target(&cancel).await? else {
            return Ok(());
        };

        // Specs are parsed once; they are re-resolved against each fresh
        // snapshot below.
        let specs = self
            .forwardings
            .iter()
            .map(|input| ForwardingSpec::parse(input, &target))
            .collect::<Result<Vec<_>>>()?;

        self.config.progress("Pulling forwarder image...");
        self.runtime.pull_image(&self.config.image).await?;

        loop {
            let plans = specs
                .iter()
                .map(|spec| plan::resolve(spec, &target))
                .collect::<Result<Vec<ForwardingPlan>>>()?;

            let generation = cancel.child_token();
            let mut supervisor_task = tokio::spawn(supervisor::run_generation(
                self.runtime.clone(),
                self.config.clone(),
                plans,
                generation.clone(),
            ));

            tokio::select! {
                joined = &mut supervisor_task => {
                    // The generation ended on its own: a forwarder failed,
                    // or teardown after root cancellation finished.
                    return match joined {
                        Ok(result) => result,
                        Err(err) => {
                            tracing::error!("generation supervisor panicked: {}", err);
                            Err(ForwardError::ForwardersFailed)
                        }
                    };
                }
                waited = self.runtime.wait_not_running(&target.id) => {
                    self.config.progress("Target exited");
                    self.config.progress("Stopping the forwarders...");
                    generation.cancel();
                    match supervisor_task.await {
                        Ok(Ok(())) => {}
                        // The target just went away; its forwarders dying
                        // with it is not the headline.
                        Ok(Err(err)) => {
                            tracing::debug!("generation ended with '{}' during target shutdown", err);
                        }
                        Err(err) => tracing::error!("generation supervisor panicked: {}", err),
                    }
                    waited?;
                }
            }

            if cancel.is_cancelled() {
                return Ok(());
            }
            if self.config.running_timeout.is_zero() {
                self.config.progress("Forwarding's done. Exiting...");
                return Ok(());
            }

            self.config.progress(&format!(
                "Giving target {:?} to get up and running again...",
                self.config.running_timeout
            ));
            match self.acquire_target(&cancel).await? {
                Some(next) => target = next,
                None => return Ok(()),
            }
        }
    }

    /// Inspect the target until it is running, bounded by the running
    /// timeout. `Ok(None)` means `cancel` fired while waiting.
    async fn acquire_target(&self, cancel: &CancellationToken) -> Result<Option<Target>> {
        let deadline = Instant::now() + self.config.running_timeout;
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let details = self.runtime.inspect(&self.target_ref).await?;
            if details.running {
                return Ok(Some(Target::from_details(&details)));
            }
            if self.config.running_timeout.is_zero() || Instant::now() >= deadline {
                return Err(ForwardError::TargetNotRunning {
                    target: self.target_ref.clone(),
                    timeout: self.config.running_timeout,
                });
            }
            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }
}
