//! Engine configuration.

use std::ops::RangeInclusive;
use std::time::Duration;

/// Image used for the relay containers: a minimal socat build.
pub const DEFAULT_FORWARDER_IMAGE: &str = "nixery.dev/shell/socat:latest";

/// Tunables for one forwarding session.
#[derive(Debug, Clone)]
pub struct ForwardConfig {
    /// Image for both the direct relays and the sidecar inner proxies.
    pub image: String,
    /// How long the target gets to (re)enter the running state. Zero makes
    /// the session exit as soon as the target stops.
    pub running_timeout: Duration,
    /// Interval between target re-inspections while re-acquiring it.
    pub poll_interval: Duration,
    /// Upper bound on each best-effort cleanup call.
    pub cleanup_timeout: Duration,
    /// Range the sidecar candidate port is drawn from. The draw is not
    /// checked against ports already bound inside the target.
    pub sidecar_ports: RangeInclusive<u16>,
    /// Suppress progress lines. Forwarding lines are always printed.
    pub quiet: bool,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_FORWARDER_IMAGE.to_string(),
            running_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            cleanup_timeout: Duration::from_secs(5),
            sidecar_ports: 32768..=60999,
            quiet: false,
        }
    }
}

impl ForwardConfig {
    /// Draw a candidate port for a sidecar inner proxy.
    pub fn draw_sidecar_port(&self) -> u16 {
        use rand::Rng;
        rand::thread_rng().gen_range(self.sidecar_ports.clone())
    }

    /// Print a progress line unless running quiet.
    pub fn progress(&self, line: &str) {
        if !self.quiet {
            println!("{line}");
        }
    }
}
