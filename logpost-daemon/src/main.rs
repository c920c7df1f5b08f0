use anyhow::{Context, Result};
use clap::Parser;

use logpost_core::config::Pipelines;
use logpost_daemon::cli::DaemonCli;
use logpost_daemon::logging;
use logpost_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    logging::init_tracing(&cli.log_level, &cli.log_format)?;

    tracing::info!(config = %cli.config.display(), "logpost-daemon starting");

    let content = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("failed to read config file {}", cli.config.display()))?;
    let pipelines: Pipelines = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", cli.config.display()))?;

    let mut orchestrator = Orchestrator::build(&pipelines)?;
    tracing::info!(
        pipelines = orchestrator.pipeline_count(),
        "configuration loaded"
    );

    if cli.validate {
        tracing::info!("configuration valid");
        return Ok(());
    }

    orchestrator.run().await?;
    tracing::info!("logpost-daemon running — pipelines active");

    wait_for_shutdown().await?;
    tracing::info!("shutdown signal received");

    orchestrator.shutdown().await;
    tracing::info!("logpost-daemon shut down");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("failed to listen for ctrl-c")?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")?;
    }
    Ok(())
}
