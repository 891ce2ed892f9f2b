//! Repayment Domain - Repayment Application and Payment Reversal
//!
//! This crate holds the repayment ledger of a lending account and the two
//! operations that move money through it:
//!
//! - **Repayment**: money from a payment gateway is applied to unpaid bills,
//!   oldest first, paying late fees, then interest, then principal.
//! - **Reversal**: a previously applied repayment is voided. A negated
//!   `payment_void` transaction is written and the money is taken back off
//!   the same components in the same precedence.
//!
//! # Ledger layers
//!
//! - **Facts** (append-only): `AccountTransaction`, `PaymentEvent`
//! - **Aggregates** (recomputed): `Payment`, `AccountPayment`, `Loan`,
//!   `AccountProperty`, `Ptp`
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_repayment::{ReversalPolicy, ReversalRequest, ReversalService};
//!
//! let service = ReversalService::new(store, ReversalPolicy::default());
//!
//! let outcome = service
//!     .process_customer_payment_reversal(ReversalRequest::new(origin_id))
//!     .await?;
//! assert_eq!(outcome.reversal_transaction.transaction_amount, -origin_amount);
//! ```

pub mod account;
pub mod account_payment;
pub mod consumer;
pub mod error;
pub mod late_fee;
pub mod payment;
pub mod payment_event;
pub mod policy;
pub mod ports;
pub mod proven;
pub mod ptp;
pub mod repayment;
pub mod reversal;
pub mod snapshot;
pub mod status;
pub mod transaction;

pub use account::{Account, AccountProperty, AccountStatus, Loan, LoanStatus};
pub use account_payment::AccountPayment;
pub use consumer::{
    consume_reversal_for_interest, consume_reversal_for_late_fee, consume_reversal_for_principal,
    consume_reversal_in_precedence, sort_payments_for_reversal, ConsumeResult, PaymentReversal,
    PrecedenceResult,
};
pub use error::RepaymentError;
pub use late_fee::{process_late_fee_reversal, reverse_late_fee_event};
pub use payment::{Component, ComponentBreakdown, Payment, PaymentStatus};
pub use payment_event::{PaymentEvent, PaymentEventType};
pub use policy::{OverReversalPolicy, ReversalPolicy};
pub use ports::{RepaymentProcessor, RepaymentRequest, RepaymentStore, RepaymentTx};
pub use proven::{reverse_is_proven, reverse_is_proven_for_account};
pub use ptp::{Ptp, PtpStatus};
pub use repayment::WaterfallRepaymentProcessor;
pub use reversal::{
    reverse_customer_payment, transfer_payment_after_reversal,
    update_ptp_status_for_origin_account_transaction, ReversalOutcome, ReversalRequest,
    ReversalService, TransferOutcome,
};
pub use snapshot::{
    construct_loan_payments_list, construct_old_paid_amount_list, LoanPayments, OldPaidAmount,
};
pub use transaction::{AccountTransaction, PaybackTransaction, TransactionType};
