//! JULO Reversal - Worker Binary
//!
//! # Usage
//!
//! ```bash
//! # Void a repayment
//! julo-reversal reverse-payment ATX-<uuid>
//!
//! # Void a repayment and move the money to another account
//! julo-reversal reverse-payment ATX-<uuid> --transfer-to ACC-<uuid>
//!
//! # Void a late fee
//! julo-reversal reverse-late-fee ATX-<uuid>
//! ```
//!
//! # Environment Variables
//!
//! * `REVERSAL_DATABASE_URL` - PostgreSQL connection string
//! * `REVERSAL_LOG_LEVEL` - Log level when `RUST_LOG` is unset (default: info)
//! * `REVERSAL_LOG_JSON` - Emit JSON logs (default: false)
//! * `REVERSAL_MAX_CONNECTIONS` - Pool size (default: 5)
//! * `REVERSAL_OVER_REVERSAL` - `reject` or `log_and_continue` (default: reject)
//! * `REVERSAL_PROVEN_THRESHOLD` - Loan amount in rupiah a paid-off loan must exceed
//! * `REVERSAL_CASHBACK_EXPERIMENT` - Forward the cashback flag on transfers

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::HealthCheckable;
use domain_repayment::ReversalService;
use infra_db::{create_pool, run_migrations, DatabaseConfig, PgRepaymentStore};
use interface_worker::{execute, Cli, Command, ReversalConfig, WorkerError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = ReversalConfig::from_env().context("loading REVERSAL_* configuration")?;

    init_tracing(&config.log_level, config.log_json);

    match run(cli.command, &config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(error = %e, "Reversal command failed");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(command: Command, config: &ReversalConfig) -> Result<(), WorkerError> {
    let pool = create_pool(
        DatabaseConfig::new(config.database_url.clone()).max_connections(config.max_connections),
    )
    .await?;
    run_migrations(&pool).await?;

    let store = Arc::new(PgRepaymentStore::new(pool));

    if command == Command::Health {
        let health = store.health_check().await;
        print_json(&health);
        if !health.is_healthy() {
            return Err(WorkerError::Unhealthy(
                health.message.unwrap_or_else(|| "database unhealthy".to_string()),
            ));
        }
        return Ok(());
    }

    let service = ReversalService::new(store, config.to_policy());
    tracing::info!(
        over_reversal = %config.over_reversal,
        cashback_experiment = config.cashback_experiment,
        "Running reversal command"
    );

    let report = execute(&service, command, Utc::now()).await?;
    print_json(&report);
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::warn!(error = %e, "Could not serialize command output"),
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}
