//! fuelquote - weekly U.S. retail fuel prices and trip fuel cost quotes
//!
//! Every command prints its result as JSON on stdout. Errors go to stderr and
//! the exit code tells a bad request (2) from a missing grade (3) and an
//! unavailable price feed (4).

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use fuelquote::cli::{exit_code_for, Action, Cli, StartupConfig};
use fuelquote::service::{PriceService, ServiceError};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ServiceError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ServiceError::Validation(format!("could not encode response: {}", e)))
}

/// Runs one action against the service and renders the result
async fn run(service: &PriceService, action: &Action) -> Result<String, ServiceError> {
    match action {
        Action::Price(grade) => to_json(&service.get_price(*grade).await?),
        Action::Quote(request) => to_json(&service.quote_trip(request).await?),
        Action::Snapshot => to_json(service.snapshot().await?.as_ref()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before clap reads the environment
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let startup = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };
    tracing::debug!(config = ?startup.service, "starting");

    let service = match PriceService::from_config(&startup.service) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&service, &startup.action).await {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_code_for(e.kind()))
        }
    }
}
