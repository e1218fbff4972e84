//! Bollard-backed [`ContainerRuntime`] implementation.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding};
use futures::StreamExt;

use crate::runtime::{
    ContainerDetails, ContainerRuntime, CreateOpts, Endpoint, HostBinding, Result, RuntimeError,
};

/// Per-request timeout bollard applies, in seconds.
const CLIENT_TIMEOUT_SECS: u64 = 120;

/// Talks to a Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the daemon and check that it is responsive.
    ///
    /// `host` accepts `unix://` and `tcp://`/`http://` endpoints; without it
    /// the platform-local daemon is used.
    pub async fn connect(host: Option<&str>) -> Result<Self> {
        let docker = match host {
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_unix(host, CLIENT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
            Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => {
                Docker::connect_with_http(host, CLIENT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
            Some(host) => {
                return Err(RuntimeError::Connect {
                    reason: format!("unsupported Docker host '{host}'"),
                });
            }
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| RuntimeError::Connect {
            reason: e.to_string(),
        })?;

        docker.ping().await.map_err(|e| RuntimeError::Connect {
            reason: e.to_string(),
        })?;

        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn inspect(&self, container: &str) -> Result<ContainerDetails> {
        let resp = self
            .docker
            .inspect_container(container, None)
            .await
            .map_err(|e| RuntimeError::Inspect {
                container: container.to_string(),
                reason: e.to_string(),
            })?;

        let running = resp
            .state
            .as_ref()
            .and_then(|state| state.running)
            .unwrap_or(false);
        let name = resp
            .name
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string();

        let mut networks = BTreeMap::new();
        let mut ports = BTreeMap::new();
        if let Some(settings) = resp.network_settings {
            for (network, endpoint) in settings.networks.unwrap_or_default() {
                networks.insert(
                    network,
                    Endpoint {
                        ip: endpoint.ip_address.unwrap_or_default(),
                        aliases: endpoint.aliases.unwrap_or_default(),
                    },
                );
            }
            for (spec, bindings) in settings.ports.unwrap_or_default() {
                // Keys look like "80/tcp"; only TCP matters here.
                let Some(port) = spec.strip_suffix("/tcp").and_then(|p| p.parse::<u16>().ok())
                else {
                    continue;
                };
                let bindings = bindings
                    .unwrap_or_default()
                    .into_iter()
                    .map(|binding| HostBinding {
                        host_ip: binding.host_ip.unwrap_or_default(),
                        host_port: binding.host_port.unwrap_or_default(),
                    })
                    .collect();
                ports.insert(port, bindings);
            }
        }

        Ok(ContainerDetails {
            id: resp.id.unwrap_or_default(),
            name,
            running,
            networks,
            ports,
        })
    }

    async fn create(&self, opts: CreateOpts) -> Result<String> {
        let exposed_ports: HashMap<String, HashMap<(), ()>> = opts
            .exposed_ports
            .iter()
            .map(|port| (format!("{port}/tcp"), HashMap::new()))
            .collect();

        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        for (container_port, host_ip, host_port) in &opts.port_bindings {
            port_bindings
                .entry(format!("{container_port}/tcp"))
                .or_default()
                .get_or_insert_with(Vec::new)
                .push(PortBinding {
                    host_ip: Some(host_ip.clone()),
                    host_port: host_port.map(|port| port.to_string()),
                });
        }

        let host_config = HostConfig {
            auto_remove: Some(opts.auto_remove),
            port_bindings: if port_bindings.is_empty() {
                None
            } else {
                Some(port_bindings)
            },
            network_mode: Some(opts.network_mode.clone()),
            ..Default::default()
        };

        let config = Config {
            image: Some(opts.image.clone()),
            entrypoint: if opts.entrypoint.is_empty() {
                None
            } else {
                Some(opts.entrypoint.clone())
            },
            cmd: if opts.cmd.is_empty() {
                None
            } else {
                Some(opts.cmd.clone())
            },
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: opts.name.clone(),
            ..Default::default()
        };

        let resp = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| RuntimeError::Create {
                name: opts.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(resp.id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError::Start {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn wait_not_running(&self, id: &str) -> Result<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut wait = self.docker.wait_container(id, Some(options));
        match wait.next().await {
            Some(Ok(resp)) => Ok(resp.status_code),
            // bollard reports a non-zero exit as an error variant carrying
            // the status; the engine only cares that the container stopped.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(RuntimeError::Wait {
                id: id.to_string(),
                reason: e.to_string(),
            }),
            None => Err(RuntimeError::Wait {
                id: id.to_string(),
                reason: "wait stream ended unexpectedly".to_string(),
            }),
        }
    }

    async fn kill(&self, id: &str, signal: &str) -> Result<()> {
        self.docker
            .kill_container(id, Some(KillContainerOptions { signal }))
            .await
            .map_err(|e| RuntimeError::Kill {
                id: id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn remove(&self, id: &str, force: bool) -> Result<()> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        match self.docker.remove_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            // Already gone, e.g. auto-removed after its process died.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(()),
            Err(e) => Err(RuntimeError::Remove {
                id: id.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            tracing::debug!("image '{}' exists locally", image);
            return Ok(());
        }

        tracing::info!("pulling image: {}", image);
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        tracing::trace!("pull status: {}", status);
                    }
                }
                Err(e) => {
                    return Err(RuntimeError::ImagePull {
                        image: image.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
