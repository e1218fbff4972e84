//! The forwarding-address grammar.
//!
//! A spec is 1-4 colon-separated tokens:
//!
//! ```text
//! REMOTE_PORT
//! LOCAL_PORT:REMOTE_PORT
//! REMOTE_HOST:REMOTE_PORT
//! LOCAL_PORT:REMOTE_HOST:REMOTE_PORT
//! LOCAL_HOST:LOCAL_PORT:REMOTE_PORT
//! LOCAL_HOST:LOCAL_PORT:REMOTE_HOST:REMOTE_PORT
//! ```
//!
//! The ambiguous 2- and 3-token forms are disambiguated by whether the first
//! token parses as a TCP port. Forms without a remote host require a target
//! with exactly one IP; forms without a local port get a daemon-assigned one.

use crate::forward::error::{ForwardError, Result};
use crate::forward::target::Target;

/// Host a forwarding binds locally when none is given.
pub const DEFAULT_LOCAL_HOST: &str = "127.0.0.1";

/// One `-L` value, normalized. `None` fields are host-assigned (local side)
/// or resolved against the target's unambiguous IP (remote side).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingSpec {
    pub local_host: Option<String>,
    pub local_port: Option<u16>,
    pub remote_host: Option<String>,
    pub remote_port: u16,
}

impl ForwardingSpec {
    /// Parse one forwarding string against the current target snapshot.
    ///
    /// The snapshot is only consulted to reject implicit-remote-host forms
    /// against a target with zero or several IPs; the string itself is
    /// target-independent.
    pub fn parse(input: &str, target: &Target) -> Result<Self> {
        let tokens: Vec<&str> = input.split(':').collect();
        let spec = match tokens[..] {
            [rp] => {
                let remote_port = parse_remote_port(input, rp)?;
                target.unambiguous_endpoint()?;
                Self {
                    local_host: None,
                    local_port: None,
                    remote_host: None,
                    remote_port,
                }
            }
            [first, rp] => {
                let remote_port = parse_remote_port(input, rp)?;
                if let Some(local_port) = parse_port(first) {
                    // LOCAL_PORT:REMOTE_PORT
                    target.unambiguous_endpoint()?;
                    Self {
                        local_host: None,
                        local_port: Some(local_port),
                        remote_host: None,
                        remote_port,
                    }
                } else {
                    // REMOTE_HOST:REMOTE_PORT; an empty host keeps the
                    // unambiguous-IP behavior of the one-token form.
                    let remote_host = implicit_or_named_host(first, target)?;
                    Self {
                        local_host: None,
                        local_port: None,
                        remote_host,
                        remote_port,
                    }
                }
            }
            [first, second, rp] => {
                let remote_port = parse_remote_port(input, rp)?;
                if let Some(local_port) = parse_port(first) {
                    // LOCAL_PORT:REMOTE_HOST:REMOTE_PORT
                    if second.is_empty() {
                        return Err(ForwardError::BadRemoteHost {
                            spec: input.to_string(),
                        });
                    }
                    Self {
                        local_host: None,
                        local_port: Some(local_port),
                        remote_host: Some(second.to_string()),
                        remote_port,
                    }
                } else {
                    // LOCAL_HOST:LOCAL_PORT:REMOTE_PORT
                    let local_port =
                        parse_port(second).ok_or_else(|| ForwardError::BadLocalPort {
                            spec: input.to_string(),
                            port: second.to_string(),
                        })?;
                    target.unambiguous_endpoint()?;
                    Self {
                        local_host: non_empty(first),
                        local_port: Some(local_port),
                        remote_host: None,
                        remote_port,
                    }
                }
            }
            [lh, lp, rh, rp] => {
                let remote_port = parse_remote_port(input, rp)?;
                let local_port = if lp.is_empty() {
                    None
                } else {
                    Some(parse_port(lp).ok_or_else(|| ForwardError::BadLocalPort {
                        spec: input.to_string(),
                        port: lp.to_string(),
                    })?)
                };
                let remote_host = implicit_or_named_host(rh, target)?;
                Self {
                    local_host: non_empty(lh),
                    local_port,
                    remote_host,
                    remote_port,
                }
            }
            _ => {
                return Err(ForwardError::MalformedSpec {
                    spec: input.to_string(),
                });
            }
        };
        Ok(spec)
    }
}

/// An empty local-host token means the default local host.
fn non_empty(token: &str) -> Option<String> {
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// `None` unless the token is a TCP port, 1-65535.
fn parse_port(token: &str) -> Option<u16> {
    token.parse::<u16>().ok().filter(|port| *port > 0)
}

fn parse_remote_port(spec: &str, token: &str) -> Result<u16> {
    parse_port(token).ok_or_else(|| ForwardError::BadRemotePort {
        spec: spec.to_string(),
        port: token.to_string(),
    })
}

/// An empty remote-host token means "the target's single IP", which must
/// then actually be single.
fn implicit_or_named_host(token: &str, target: &Target) -> Result<Option<String>> {
    if token.is_empty() {
        target.unambiguous_endpoint()?;
        Ok(None)
    } else {
        Ok(Some(token.to_string()))
    }
}
