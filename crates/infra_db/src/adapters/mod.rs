//! Domain Adapters
//!
//! This module provides adapter implementations for domain ports,
//! connecting domain interfaces to the PostgreSQL database layer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PgRepaymentStore;
//! use domain_repayment::RepaymentStore;
//!
//! let store = PgRepaymentStore::new(pool);
//! let mut tx = store.begin().await?;
//! let trx = tx.get_account_transaction(id).await?;
//! ```

pub mod repayment;

pub use repayment::{PgRepaymentStore, PgRepaymentTx};
