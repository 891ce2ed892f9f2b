//! Repository implementations for the repayment ledger
//!
//! Repositories encapsulate SQL queries and map between database rows and
//! domain types. They take a `PgConnection` so the caller owns transaction
//! boundaries.
//!
//! Queries are checked at runtime (`query_as` with `FromRow` rows) so the
//! crate builds without a live database.

pub mod repayment;

pub use repayment::RepaymentRepository;
