//! Worker error handling

use thiserror::Error;

use domain_repayment::RepaymentError;
use infra_db::DatabaseError;

/// Worker error types
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Database unhealthy: {0}")]
    Unhealthy(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Repayment(#[from] RepaymentError),
}

impl WorkerError {
    /// Process exit code for this error
    ///
    /// Business rejections exit with 2 so schedulers can tell them apart
    /// from infrastructure failures, which exit with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkerError::Repayment(e) if !matches!(e, RepaymentError::Port(_)) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{AccountTransactionId, PortError};

    #[test]
    fn test_business_rejection_exit_code() {
        let error = WorkerError::from(RepaymentError::NoPaymentEvents(AccountTransactionId::new()));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_storage_failure_exit_code() {
        let error = WorkerError::from(RepaymentError::Port(PortError::connection("refused")));
        assert_eq!(error.exit_code(), 1);
        assert_eq!(WorkerError::InvalidConfig("x".into()).exit_code(), 1);
    }
}
