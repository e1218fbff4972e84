//! `portward` entry point.

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use portward::cli::Cli;
use portward::forward::{ForwardConfig, ForwardSession};
use portward::runtime::DockerRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let runtime = DockerRuntime::connect(cli.docker_host.as_deref()).await?;

    let config = ForwardConfig {
        image: cli.forwarder_image,
        running_timeout: cli.running_timeout,
        quiet: cli.quiet,
        ..ForwardConfig::default()
    };

    let session = ForwardSession::new(Arc::new(runtime), config, cli.target, cli.forward);
    session.run(cancel).await?;
    Ok(())
}

/// Cancel the root token on SIGINT or SIGTERM; both mean a graceful exit.
async fn shutdown_signal(cancel: CancellationToken) {
    let interrupt = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = interrupt => {}
                    _ = term.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!("cannot install SIGTERM handler: {}", err);
                let _ = interrupt.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = interrupt.await;
    }

    cancel.cancel();
}
