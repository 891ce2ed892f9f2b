//! Ports and Adapters Infrastructure
//!
//! Domain crates declare their storage needs as port traits that extend the
//! marker traits here. Adapters (PostgreSQL in `infra_db`, in-memory in
//! `test_utils`) implement those traits, and services only ever see the port.
//!
//! ```text
//!        Application services (ReversalService)
//!                         │
//!                         ▼
//!          Port traits (RepaymentStore / RepaymentTx)
//!                 ▲                       ▲
//!        ┌────────┴────────┐     ┌────────┴────────┐
//!        │ PostgreSQL      │     │ In-memory        │
//!        │ adapter         │     │ adapter (tests)  │
//!        └─────────────────┘     └──────────────────┘
//! ```

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Error returned by every port operation
///
/// Adapters translate their native failures into these variants so the
/// domain can decide between rejecting a request and retrying it.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// A write collided with a uniqueness or integrity rule
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// Another transaction holds the rows this one needs
    #[error("Contention: {message}")]
    Contention {
        message: String,
    },

    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A row could not be mapped to or from its domain type
    #[error("Transformation error: {message}")]
    Transformation {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    pub fn contention(message: impl Into<String>) -> Self {
        PortError::Contention {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn transformation(message: impl Into<String>) -> Self {
        PortError::Transformation {
            message: message.into(),
        }
    }

    /// Whether the same operation may succeed if retried
    ///
    /// Lost connections and lock contention are transient; a conflict means
    /// the write itself is wrong and retrying cannot help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortError::Connection { .. } | PortError::Contention { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }
}

/// Marker for port traits and their implementations
///
/// Ports are shared across tasks behind `Arc`.
pub trait DomainPort: Send + Sync + 'static {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    Healthy,
    Unhealthy,
}

/// Outcome of probing an adapter, printed by the worker's `health` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub adapter_id: String,
    pub status: AdapterHealth,
    pub latency_ms: u64,
    /// Failure detail when unhealthy
    pub message: Option<String>,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

impl HealthCheckResult {
    pub fn is_healthy(&self) -> bool {
        self.status == AdapterHealth::Healthy
    }
}

/// Adapters whose backing system can be probed
#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_check(&self) -> HealthCheckResult;
}
