use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use beldum_adapter_btleplug::BtleplugPlatform;
use beldum_app::error::{AcquireError, Report};
use beldum_app::shutdown;
use beldumd::config::{Cli, Config, USAGE};
use beldumd::daemon::{self, SessionSettings};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::parse(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("beldumd: {err}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    if cli.help {
        print!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("beldumd: {}", Report(&err));
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let code = run(&config).await;
    tracing::info!("Good bye.");
    code
}

async fn run(config: &Config) -> ExitCode {
    let settings = match config.pattern() {
        Ok(pattern) => SessionSettings {
            pattern,
            acquisition: config.acquisition(),
            poll_interval: config.poll_interval(),
        },
        Err(err) => {
            tracing::error!(error = %Report(&err), "invalid device identifier");
            return ExitCode::FAILURE;
        }
    };

    let platform = match BtleplugPlatform::new(config.ble.adapter_index).await {
        Ok(platform) => Arc::new(platform),
        Err(err) => {
            tracing::error!(error = %Report(&err), "failed to open BLE adapter");
            return ExitCode::FAILURE;
        }
    };

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "failed to listen for Ctrl-C");
            return;
        }
        tracing::info!("interrupt received, shutting down");
        trigger.trigger();
    });

    tracing::info!(pattern = %settings.pattern, "looking for device");
    let session = tokio::spawn(async move { daemon::run(platform, &settings, shutdown).await });

    match session.await {
        Ok(Ok(summary)) => {
            tracing::info!(
                device = %summary.device,
                attempts = summary.attempts,
                captures = summary.captures,
                "session ended"
            );
            ExitCode::SUCCESS
        }
        Ok(Err(AcquireError::Cancelled)) => ExitCode::SUCCESS,
        Ok(Err(err)) => {
            tracing::error!(error = %Report(&err), "unrecoverable failure");
            ExitCode::FAILURE
        }
        Err(err) => {
            tracing::error!(error = %Report(&err), "session task crashed");
            ExitCode::FAILURE
        }
    }
}
