use anyhow::Result;
use clap::Parser;

use skywatch_core::SkywatchConfig;
use skywatch_daemon::cli::DaemonCli;
use skywatch_daemon::daemon::Daemon;
use skywatch_daemon::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // Priority: CLI > env > file > defaults
    let mut config = SkywatchConfig::from_file(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", cli.config.display(), e))?;
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "skywatch-daemon starting"
    );

    let mut daemon = Daemon::build_from_config(config).await?;
    daemon.run().await
}
