//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! repayment reversal test suite.
//!
//! # Modules
//!
//! - `store`: In-memory `RepaymentStore` with rollback and failure injection
//! - `fixtures`: Deterministic amounts, dates and ledger workflows
//! - `builders`: Account scenario builder
//! - `database`: PostgreSQL testcontainer with scenario seeding
//! - `assertions`: Ledger invariant assertions
//! - `generators`: Property-based test data generators

pub mod store;
pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use store::*;
pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
