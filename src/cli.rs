//! CLI surface for the `portward` binary.

use std::time::Duration;

use clap::Parser;

use crate::forward::DEFAULT_FORWARDER_IMAGE;
use crate::util::parse_duration;

#[derive(Parser, Debug)]
#[command(name = "portward")]
#[command(about = "\"Publish\" one or more ports of an already running container")]
#[command(
    long_about = "Forward local ports to endpoints reachable from inside a running container,\n\
                  without modifying or restarting it.\n\
                  Examples:\n  \
                  portward app -L 8080:80\n  \
                  portward app -L 127.0.0.1:5432:127.0.0.1:5432 --running-timeout 30s"
)]
#[command(version)]
pub struct Cli {
    /// Target container (name or id)
    pub target: String,

    /// Forwarding spec: [[LOCAL_HOST:]LOCAL_PORT:][REMOTE_HOST:]REMOTE_PORT
    #[arg(short = 'L', long = "forward", value_name = "SPEC", required = true)]
    pub forward: Vec<String>,

    /// How long to wait for the target to (re)start; 0 exits as soon as the
    /// target stops
    #[arg(
        long,
        value_name = "DURATION",
        default_value = "10s",
        value_parser = parse_duration
    )]
    pub running_timeout: Duration,

    /// Image used for the relay containers
    #[arg(
        long,
        value_name = "IMAGE",
        env = "PORTWARD_FORWARDER_IMAGE",
        default_value = DEFAULT_FORWARDER_IMAGE
    )]
    pub forwarder_image: String,

    /// Docker endpoint (unix:// or tcp://); defaults to the local daemon
    #[arg(long, value_name = "HOST", env = "DOCKER_HOST")]
    pub docker_host: Option<String>,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}
