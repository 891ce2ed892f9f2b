//! Worker configuration

use serde::Deserialize;

use core_kernel::Money;
use domain_repayment::{OverReversalPolicy, ReversalPolicy};

use crate::error::WorkerError;

/// Worker configuration
///
/// Loaded from `REVERSAL_*` environment variables, e.g.
/// `REVERSAL_DATABASE_URL` or `REVERSAL_OVER_REVERSAL=log_and_continue`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReversalConfig {
    /// Database URL
    pub database_url: String,
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    pub max_connections: u32,
    pub over_reversal: OverReversalPolicy,
    /// Proven threshold in whole rupiah
    pub proven_threshold: i64,
    pub cashback_experiment: bool,
}

impl Default for ReversalConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/julo".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            max_connections: 5,
            over_reversal: OverReversalPolicy::Reject,
            proven_threshold: 1_000_000,
            cashback_experiment: false,
        }
    }
}

impl ReversalConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_source(config::Environment::with_prefix("REVERSAL").try_parsing(true))
    }

    /// Loads configuration from any `config` source layered over the defaults
    pub fn from_source<T>(source: T) -> Result<Self, WorkerError>
    where
        T: config::Source + Send + Sync + 'static,
    {
        let defaults = Self::default();
        let config: Self = config::Config::builder()
            .set_default("database_url", defaults.database_url)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_json", defaults.log_json)?
            .set_default("max_connections", i64::from(defaults.max_connections))?
            .set_default("over_reversal", defaults.over_reversal.to_string())?
            .set_default("proven_threshold", defaults.proven_threshold)?
            .set_default("cashback_experiment", defaults.cashback_experiment)?
            .add_source(source)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), WorkerError> {
        if self.proven_threshold < 0 {
            return Err(WorkerError::InvalidConfig(format!(
                "proven_threshold must not be negative, got {}",
                self.proven_threshold
            )));
        }
        if self.max_connections == 0 {
            return Err(WorkerError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the policy the reversal service runs with
    pub fn to_policy(&self) -> ReversalPolicy {
        ReversalPolicy::default()
            .with_over_reversal(self.over_reversal)
            .with_proven_threshold(Money::idr(self.proven_threshold))
            .with_cashback_experiment(self.cashback_experiment)
    }
}
