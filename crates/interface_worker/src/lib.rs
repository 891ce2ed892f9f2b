//! Reversal Worker
//!
//! Command-line entry point for the repayment reversal engine. Operations
//! staff run one reversal per invocation; the result is printed as JSON.
//!
//! # Example
//!
//! ```bash
//! REVERSAL_DATABASE_URL=postgres://localhost/julo \
//!     julo-reversal reverse-payment ATX-0190f7d2-... --transfer-to 0190f7d3-...
//! ```

pub mod commands;
pub mod config;
pub mod error;

pub use commands::{execute, Cli, Command, CommandReport};
pub use config::ReversalConfig;
pub use error::WorkerError;
