//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL persistence for the repayment ledger
//! using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. `repositories` holds the row
//! types and SQL; `adapters` implements the domain's storage ports on top of
//! them so the domain layer never sees a database type.
//!
//! # Transactions
//!
//! Every reversal runs in a single database transaction opened by
//! [`PgRepaymentStore`](adapters::PgRepaymentStore). The account row is
//! locked with `FOR UPDATE` before anything is read or written.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool_from_url, run_migrations, adapters::PgRepaymentStore};
//!
//! let pool = create_pool_from_url("postgres://localhost/julo").await?;
//! run_migrations(&pool).await?;
//! let store = PgRepaymentStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, create_pool_from_url, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use adapters::{PgRepaymentStore, PgRepaymentTx};
