//! Target snapshot and network resolution.

use std::collections::BTreeMap;

use crate::forward::error::{ForwardError, Result};
use crate::runtime::{ContainerDetails, Endpoint};

/// Immutable view of the target container, taken fresh per generation.
#[derive(Debug, Clone)]
pub struct Target {
    pub id: String,
    pub name: String,
    pub running: bool,
    /// Network attachments keyed by network name. Iteration order - and with
    /// it every "first match" below - is lexicographic.
    pub networks: BTreeMap<String, Endpoint>,
}

impl Target {
    pub fn from_details(details: &ContainerDetails) -> Self {
        Self {
            id: details.id.clone(),
            name: details.name.clone(),
            running: details.running,
            networks: details.networks.clone(),
        }
    }

    /// Attachments that actually carry an address.
    fn addressed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.networks
            .iter()
            .filter(|(_, endpoint)| !endpoint.ip.is_empty())
            .map(|(network, endpoint)| (network.as_str(), endpoint.ip.as_str()))
    }

    /// The target's single `(network, ip)`, required by the forwarding forms
    /// that leave the remote host implicit.
    pub fn unambiguous_endpoint(&self) -> Result<(&str, &str)> {
        let mut addressed = self.addressed();
        match (addressed.next(), addressed.next()) {
            (Some(endpoint), None) => Ok(endpoint),
            (None, _) => Err(ForwardError::NoAddress),
            (Some(_), Some(_)) => Err(ForwardError::AmbiguousTarget),
        }
    }

    /// Resolve `host` against the attachments: the attachment's IP, one of
    /// its aliases, or the network name itself. First match wins.
    pub fn lookup_host(&self, host: &str) -> Option<(&str, &str)> {
        self.networks
            .iter()
            .filter(|(_, endpoint)| !endpoint.ip.is_empty())
            .find(|(network, endpoint)| {
                endpoint.ip == host
                    || endpoint.aliases.iter().any(|alias| alias == host)
                    || network.as_str() == host
            })
            .map(|(network, endpoint)| (network.as_str(), endpoint.ip.as_str()))
    }

    /// The attachment that owns `ip`.
    pub fn network_for_ip(&self, ip: &str) -> Option<&str> {
        self.networks
            .iter()
            .find(|(_, endpoint)| !endpoint.ip.is_empty() && endpoint.ip == ip)
            .map(|(network, _)| network.as_str())
    }

    /// Any attachment with an address; the outer leg of a sidecar forwarding
    /// connects to it.
    pub fn first_endpoint(&self) -> Result<(&str, &str)> {
        self.addressed().next().ok_or(ForwardError::NoAddress)
    }
}
