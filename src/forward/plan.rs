//! Strategy selection: one resolved plan per forwarding per generation.
//!
//! Direct is preferred whenever the remote endpoint is visible from one of
//! the target's own network attachments; it costs a single relay container
//! and ordinary container-network routing. Sidecar is the fallback that
//! reaches endpoints only the target itself can see (its loopback, or
//! anything bound to an address invisible from outside) by joining the
//! target's network namespace.

use crate::forward::error::Result;
use crate::forward::spec::{DEFAULT_LOCAL_HOST, ForwardingSpec};
use crate::forward::target::Target;

/// A forwarding resolved against one target snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardingPlan {
    Direct(DirectPlan),
    Sidecar(SidecarPlan),
}

/// One relay container on `network`, publishing
/// `local_host:local_port -> remote_ip:remote_port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectPlan {
    pub local_host: String,
    /// `None`: the daemon picks the host port.
    pub local_port: Option<u16>,
    /// What the user asked for; reporting only.
    pub remote_host: String,
    /// Where the relay actually connects.
    pub remote_ip: String,
    pub remote_port: u16,
    /// Network the relay container joins.
    pub network: String,
}

/// An inner proxy inside the target's network namespace plus a direct outer
/// leg connecting to it through `target_host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarPlan {
    pub local_host: String,
    pub local_port: Option<u16>,
    /// Endpoint as seen from inside the target's namespace.
    pub remote_host: String,
    pub remote_port: u16,
    /// Container whose network namespace the inner proxy joins.
    pub target_id: String,
    /// Externally-visible target IP the outer leg connects to.
    pub target_host: String,
    /// Network the outer relay joins.
    pub network: String,
}

/// Decide the proxy topology for `spec` against `target`.
pub fn resolve(spec: &ForwardingSpec, target: &Target) -> Result<ForwardingPlan> {
    let local_host = spec
        .local_host
        .clone()
        .unwrap_or_else(|| DEFAULT_LOCAL_HOST.to_string());

    let Some(remote_host) = &spec.remote_host else {
        let (network, ip) = target.unambiguous_endpoint()?;
        return Ok(ForwardingPlan::Direct(DirectPlan {
            local_host,
            local_port: spec.local_port,
            remote_host: ip.to_string(),
            remote_ip: ip.to_string(),
            remote_port: spec.remote_port,
            network: network.to_string(),
        }));
    };

    if let Some((network, ip)) = target.lookup_host(remote_host) {
        return Ok(ForwardingPlan::Direct(DirectPlan {
            local_host,
            local_port: spec.local_port,
            remote_host: remote_host.clone(),
            remote_ip: ip.to_string(),
            remote_port: spec.remote_port,
            network: network.to_string(),
        }));
    }

    // Not an address the target exposes externally; reach it from inside
    // the target's own namespace.
    let (network, target_host) = target.first_endpoint()?;
    Ok(ForwardingPlan::Sidecar(SidecarPlan {
        local_host,
        local_port: spec.local_port,
        remote_host: remote_host.clone(),
        remote_port: spec.remote_port,
        target_id: target.id.clone(),
        target_host: target_host.to_string(),
        network: network.to_string(),
    }))
}
