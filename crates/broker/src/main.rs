use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use station_broker::cli::{Cli, Command, ConfigCommand};
use station_broker::state::AppState;
use station_broker::{dls_bootstrap, dispatcher};
use station_domain::config::{Config, ConfigSeverity};
use station_engine::NatsStreamEngine;
use station_store::MetadataRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = station_broker::cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = station_broker::cli::load_config()?;
            let passed = station_broker::cli::doctor(&config, &config_path).await;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = station_broker::cli::load_config()?;
            let valid = station_broker::cli::validate_config(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = station_broker::cli::load_config()?;
            station_broker::cli::show_config(&config);
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,station_broker=debug")))
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("stationd starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let store = Arc::new(MetadataRepository::new(std::path::Path::new(&config.store.state_dir))?);
    tracing::info!(stations = store.list_stations().len(), "metadata repository ready");

    let storage_is_file = true;
    let request_timeout = std::time::Duration::from_millis(config.nats.request_timeout_ms);
    let engine = Arc::new(
        NatsStreamEngine::connect(
            &config.nats.url,
            config.broker.default_replicas as usize,
            storage_is_file,
            request_timeout,
        )
        .await?,
    );
    let nats_client = engine.client().clone();
    tracing::info!(url = %config.nats.url, "connected to NATS");

    let state = AppState::new(config.clone(), store.clone(), engine, Some(nats_client.clone()));

    let backfilled = dls_bootstrap::launch_dls_for_old_stations(&state).await?;
    tracing::info!(backfilled, "DLS bootstrap complete");

    dispatcher::run(state.clone(), nats_client).await;
    tracing::info!(queue_group = %config.broker.queue_group, "request dispatcher listening");

    // Mutations land in memory only; flush on a steady cadence so a crash
    // loses at most one interval's worth of them.
    loop {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        if let Err(e) = store.flush() {
            tracing::warn!(error = %e, "flushing metadata repository");
        }
    }
}
