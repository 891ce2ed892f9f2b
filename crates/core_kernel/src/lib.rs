//! Core Kernel - Foundational types shared by the repayment crates
//!
//! This crate provides the fundamental building blocks used across the workspace:
//! - Money types with precise decimal arithmetic (rupiah by default)
//! - Jakarta business-date helpers
//! - Strongly-typed identifiers
//! - Port infrastructure for the hexagonal architecture

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use temporal::{Timezone, days_past_due};
pub use identifiers::{
    CustomerId, AccountId, LoanId, PaymentId, AccountPaymentId,
    AccountTransactionId, PaybackTransactionId, PaymentEventId, PtpId,
};
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
