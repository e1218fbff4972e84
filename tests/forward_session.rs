//! End-to-end engine tests against an in-memory container runtime.
//!
//! The fake runtime gives every container a scriptable lifetime through a
//! watch channel, which is enough to drive the whole session: generations,
//! teardown, target restarts, and failure aggregation.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use portward::forward::{ForwardConfig, ForwardError, ForwardSession};
use portward::runtime::{
    ContainerDetails, ContainerRuntime, CreateOpts, Endpoint, HostBinding,
    Result as RuntimeResult, RuntimeError,
};

const TARGET_ID: &str = "target-1";
const TARGET_NAME: &str = "app";

struct FakeContainer {
    details: ContainerDetails,
    running_tx: watch::Sender<bool>,
    exit_status: i64,
    opts: Option<CreateOpts>,
}

#[derive(Default)]
struct FakeState {
    containers: BTreeMap<String, FakeContainer>,
    created: usize,
}

struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    /// A runtime pre-seeded with one running target container.
    fn with_target(networks: &[(&str, &str)]) -> Arc<Self> {
        let runtime = Self {
            state: Mutex::new(FakeState::default()),
        };
        let (running_tx, _) = watch::channel(true);
        let details = ContainerDetails {
            id: TARGET_ID.to_string(),
            name: TARGET_NAME.to_string(),
            running: true,
            networks: networks
                .iter()
                .map(|(network, ip)| {
                    (
                        network.to_string(),
                        Endpoint {
                            ip: ip.to_string(),
                            aliases: Vec::new(),
                        },
                    )
                })
                .collect(),
            ports: BTreeMap::new(),
        };
        runtime.state.lock().unwrap().containers.insert(
            TARGET_ID.to_string(),
            FakeContainer {
                details,
                running_tx,
                exit_status: 0,
                opts: None,
            },
        );
        Arc::new(runtime)
    }

    /// Flip a container to the stopped state with `status`.
    fn stop(&self, id: &str, status: i64) {
        let mut state = self.state.lock().unwrap();
        if let Some(container) = state.containers.get_mut(id) {
            container.exit_status = status;
            container.details.running = false;
            let _ = container.running_tx.send(false);
        }
    }

    fn restart_target(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(container) = state.containers.get_mut(TARGET_ID) {
            container.details.running = true;
            let _ = container.running_tx.send(true);
        }
    }

    /// Ids of every container the engine created and has not removed.
    fn proxy_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .containers
            .keys()
            .filter(|id| *id != TARGET_ID)
            .cloned()
            .collect()
    }

    fn proxy_count(&self) -> usize {
        self.proxy_ids().len()
    }

    /// Total number of containers ever created by the engine.
    fn created_count(&self) -> usize {
        self.state.lock().unwrap().created
    }

    fn proxy_opts(&self) -> Vec<CreateOpts> {
        self.state
            .lock()
            .unwrap()
            .containers
            .values()
            .filter_map(|container| container.opts.clone())
            .collect()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn inspect(&self, container: &str) -> RuntimeResult<ContainerDetails> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .values()
            .find(|c| c.details.id == container || c.details.name == container)
            .map(|c| c.details.clone())
            .ok_or_else(|| RuntimeError::Inspect {
                container: container.to_string(),
                reason: "no such container".to_string(),
            })
    }

    async fn create(&self, opts: CreateOpts) -> RuntimeResult<String> {
        let mut state = self.state.lock().unwrap();
        state.created += 1;
        let id = format!("ctr-{}", state.created);
        let (running_tx, _) = watch::channel(false);
        let details = ContainerDetails {
            id: id.clone(),
            name: opts.name.clone(),
            running: false,
            networks: BTreeMap::new(),
            ports: BTreeMap::new(),
        };
        state.containers.insert(
            id.clone(),
            FakeContainer {
                details,
                running_tx,
                exit_status: 0,
                opts: Some(opts),
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &str) -> RuntimeResult<()> {
        let mut state = self.state.lock().unwrap();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::Start {
                id: id.to_string(),
                reason: "no such container".to_string(),
            })?;
        container.details.running = true;
        let _ = container.running_tx.send(true);

        // Publish bindings the way the daemon would, assigning a port where
        // none was requested.
        if let Some(opts) = &container.opts {
            for (container_port, host_ip, host_port) in opts.port_bindings.clone() {
                let host_port = host_port
                    .map(|port| port.to_string())
                    .unwrap_or_else(|| "49152".to_string());
                container.details.ports.insert(
                    container_port,
                    vec![HostBinding {
                        host_ip,
                        host_port,
                    }],
                );
            }
        }
        Ok(())
    }

    async fn wait_not_running(&self, id: &str) -> RuntimeResult<i64> {
        let mut running_rx = {
            let state = self.state.lock().unwrap();
            match state.containers.get(id) {
                Some(container) => container.running_tx.subscribe(),
                None => {
                    return Err(RuntimeError::Wait {
                        id: id.to_string(),
                        reason: "no such container".to_string(),
                    });
                }
            }
        };
        loop {
            if !*running_rx.borrow_and_update() {
                let state = self.state.lock().unwrap();
                let status = state
                    .containers
                    .get(id)
                    .map(|container| container.exit_status)
                    .unwrap_or(0);
                return Ok(status);
            }
            if running_rx.changed().await.is_err() {
                // Removed while waiting: stopped as far as the engine cares.
                return Ok(0);
            }
        }
    }

    async fn kill(&self, id: &str, _signal: &str) -> RuntimeResult<()> {
        self.stop(id, 137);
        Ok(())
    }

    async fn remove(&self, id: &str, _force: bool) -> RuntimeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.containers.remove(id);
        Ok(())
    }

    async fn pull_image(&self, _image: &str) -> RuntimeResult<()> {
        Ok(())
    }
}

fn test_config() -> ForwardConfig {
    ForwardConfig {
        running_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(10),
        cleanup_timeout: Duration::from_secs(1),
        quiet: true,
        ..Default::default()
    }
}

fn session(runtime: Arc<FakeRuntime>, config: ForwardConfig, specs: &[&str]) -> ForwardSession {
    ForwardSession::new(
        runtime,
        config,
        TARGET_NAME,
        specs.iter().map(|spec| spec.to_string()).collect(),
    )
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn test_generation_teardown_on_cancel() {
    let fake = FakeRuntime::with_target(&[("bridge", "10.0.0.5")]);
    let cancel = CancellationToken::new();
    let run = {
        let session = session(fake.clone(), test_config(), &["8080:80", "9090:90", "70"]);
        let cancel = cancel.clone();
        tokio::spawn(async move { session.run(cancel).await })
    };

    let counting = fake.clone();
    wait_until("all forwarders to start", move || counting.proxy_count() == 3).await;

    cancel.cancel();
    let result = run.await.unwrap();
    assert!(result.is_ok(), "graceful cancel should not error: {result:?}");
    assert_eq!(fake.proxy_count(), 0, "no proxy container may survive");
}

#[tokio::test]
async fn test_partial_failure_tears_down_every_forwarder() {
    let fake = FakeRuntime::with_target(&[("bridge", "10.0.0.5")]);
    let cancel = CancellationToken::new();
    let run = {
        let session = session(fake.clone(), test_config(), &["8080:80", "8081:81", "8082:82"]);
        let cancel = cancel.clone();
        tokio::spawn(async move { session.run(cancel).await })
    };

    let counting = fake.clone();
    wait_until("all forwarders to start", move || counting.proxy_count() == 3).await;

    // One proxy dies on its own; the whole generation must fail and fold
    // into a single aggregated error.
    let victim = fake.proxy_ids().into_iter().next().unwrap();
    fake.stop(&victim, 1);

    let result = run.await.unwrap();
    assert!(
        matches!(result, Err(ForwardError::ForwardersFailed)),
        "expected the aggregated failure, got {result:?}"
    );
    assert_eq!(fake.proxy_count(), 0, "all three forwarders must be torn down");
}

#[tokio::test]
async fn test_restart_loop_bound() {
    let fake = FakeRuntime::with_target(&[("bridge", "10.0.0.5")]);
    let config = ForwardConfig {
        running_timeout: Duration::from_millis(200),
        ..test_config()
    };
    let cancel = CancellationToken::new();
    let run = {
        let session = session(fake.clone(), config, &["8080:80"]);
        let cancel = cancel.clone();
        tokio::spawn(async move { session.run(cancel).await })
    };

    let counting = fake.clone();
    wait_until("the forwarder to start", move || counting.proxy_count() == 1).await;
    let created_before = fake.created_count();

    // Target stops and never comes back.
    fake.stop(TARGET_ID, 0);

    let result = run.await.unwrap();
    match result {
        Err(ForwardError::TargetNotRunning { target, timeout }) => {
            assert_eq!(target, TARGET_NAME);
            assert_eq!(timeout, Duration::from_millis(200));
        }
        other => panic!("expected the not-running error, got {other:?}"),
    }
    assert_eq!(
        fake.created_count(),
        created_before,
        "no forwarder may be (re)started for a dead target"
    );
    assert_eq!(fake.proxy_count(), 0);
}

#[tokio::test]
async fn test_target_restart_starts_a_fresh_generation() {
    let fake = FakeRuntime::with_target(&[("bridge", "10.0.0.5")]);
    let cancel = CancellationToken::new();
    let run = {
        let session = session(fake.clone(), test_config(), &["8080:80"]);
        let cancel = cancel.clone();
        tokio::spawn(async move { session.run(cancel).await })
    };

    let counting = fake.clone();
    wait_until("the first generation", move || counting.proxy_count() == 1).await;
    assert_eq!(fake.created_count(), 1);

    fake.stop(TARGET_ID, 0);
    let counting = fake.clone();
    wait_until("first generation teardown", move || counting.proxy_count() == 0).await;

    fake.restart_target();
    let counting = fake.clone();
    wait_until("the second generation", move || {
        counting.created_count() == 2 && counting.proxy_count() == 1
    })
    .await;

    cancel.cancel();
    let result = run.await.unwrap();
    assert!(result.is_ok(), "graceful cancel should not error: {result:?}");
    assert_eq!(fake.proxy_count(), 0);
}

#[tokio::test]
async fn test_zero_timeout_exits_cleanly_when_target_stops() {
    let fake = FakeRuntime::with_target(&[("bridge", "10.0.0.5")]);
    let config = ForwardConfig {
        running_timeout: Duration::ZERO,
        ..test_config()
    };
    let cancel = CancellationToken::new();
    let run = {
        let session = session(fake.clone(), config, &["8080:80"]);
        let cancel = cancel.clone();
        tokio::spawn(async move { session.run(cancel).await })
    };

    let counting = fake.clone();
    wait_until("the forwarder to start", move || counting.proxy_count() == 1).await;

    fake.stop(TARGET_ID, 0);

    let result = run.await.unwrap();
    assert!(result.is_ok(), "one-shot exit should be clean: {result:?}");
    assert_eq!(fake.proxy_count(), 0);
    assert_eq!(fake.created_count(), 1);
}

#[tokio::test]
async fn test_sidecar_forwarding_runs_two_containers() {
    let fake = FakeRuntime::with_target(&[("bridge", "10.0.0.5")]);
    let cancel = CancellationToken::new();
    let run = {
        let session = session(fake.clone(), test_config(), &["5000:127.0.0.1:5000"]);
        let cancel = cancel.clone();
        tokio::spawn(async move { session.run(cancel).await })
    };

    let counting = fake.clone();
    wait_until("both sidecar legs", move || counting.proxy_count() == 2).await;

    let opts = fake.proxy_opts();
    let inner = opts
        .iter()
        .find(|opts| opts.network_mode.starts_with("container:"))
        .expect("an inner proxy sharing the target namespace");
    assert_eq!(inner.network_mode, format!("container:{TARGET_ID}"));
    assert!(inner.port_bindings.is_empty());
    assert_eq!(inner.cmd[1], "TCP-CONNECT:127.0.0.1:5000");

    let outer = opts
        .iter()
        .find(|opts| opts.network_mode == "bridge")
        .expect("an outer relay on the target network");
    assert_eq!(outer.port_bindings.len(), 1);
    assert!(
        outer.cmd[1].starts_with("TCP-CONNECT:10.0.0.5:"),
        "outer leg must point at the target host: {:?}",
        outer.cmd
    );

    cancel.cancel();
    let result = run.await.unwrap();
    assert!(result.is_ok());
    assert_eq!(fake.proxy_count(), 0, "both legs must be torn down together");
}

#[tokio::test]
async fn test_spec_errors_precede_any_container() {
    let fake = FakeRuntime::with_target(&[("net-a", "10.0.0.5"), ("net-b", "10.0.0.6")]);
    let session = session(fake.clone(), test_config(), &["80"]);

    let result = session.run(CancellationToken::new()).await;
    assert!(matches!(result, Err(ForwardError::AmbiguousTarget)));
    assert_eq!(fake.created_count(), 0, "spec errors are pre-flight");
}
