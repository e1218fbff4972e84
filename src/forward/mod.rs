//! The local port-forwarding engine.
//!
//! Turns forwarding specs into running proxy topologies against one target
//! container and keeps them alive across target restarts:
//!
//! ```text
//! spec string ──▶ ForwardingSpec ──▶ ForwardingPlan ──▶ proxy container(s)
//!                 (parsed once)      (per generation)   (Direct: 1, Sidecar: 2)
//! ```
//!
//! A *generation* is one attempt to stand up every forwarding against one
//! snapshot of the target. The [`ForwardSession`] lifecycle loop ends the
//! generation when the target stops, tears every proxy down, and - within the
//! configured running timeout - starts a fresh one once the target is back.

pub mod config;
pub mod direct;
pub mod error;
pub mod lifecycle;
pub mod plan;
pub mod sidecar;
pub mod spec;
pub mod supervisor;
pub mod target;

pub use config::{DEFAULT_FORWARDER_IMAGE, ForwardConfig};
pub use error::{ForwardError, Result};
pub use lifecycle::ForwardSession;
pub use plan::{DirectPlan, ForwardingPlan, SidecarPlan};
pub use spec::ForwardingSpec;
pub use target::Target;
