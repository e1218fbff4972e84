//! portward - "publish" TCP ports of an already running container onto the
//! host, transiently, without modifying or restarting the container.
//!
//! The heart of the crate is the [`forward`] engine: it parses `ssh -L`-style
//! forwarding specs, decides a proxy topology per forwarding (a relay on one
//! of the target's networks, or a sidecar inside the target's network
//! namespace), supervises the resulting socat containers concurrently, and
//! re-establishes everything when the target container restarts.
//!
//! The [`runtime`] module is the only place that talks to Docker; the engine
//! consumes it through the [`runtime::ContainerRuntime`] trait.

pub mod cli;
pub mod forward;
pub mod runtime;
pub mod util;
