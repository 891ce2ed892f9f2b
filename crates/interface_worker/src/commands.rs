//! Command-line commands and their execution

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use core_kernel::{AccountId, AccountTransactionId, Money};
use domain_repayment::{RepaymentStore, ReversalRequest, ReversalService};

use crate::error::WorkerError;

#[derive(Parser, Debug)]
#[command(name = "julo-reversal")]
#[command(about = "Reverses repayments on JULO lending accounts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Void a customer payment and optionally move the money to another account
    ReversePayment {
        /// Account transaction to void (`ATX-` prefix optional)
        transaction_id: AccountTransactionId,
        /// Re-apply the reversed money to this account
        #[arg(long)]
        transfer_to: Option<AccountId>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Void the unpaid part of a late fee
    ReverseLateFee {
        transaction_id: AccountTransactionId,
    },
    /// Re-derive the proven flag of an account
    ReverseProven { account_id: AccountId },
    /// Check database connectivity
    Health,
}

/// What a command did, printed as JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandReport {
    PaymentReversed {
        account_id: AccountId,
        reversal_transaction_id: AccountTransactionId,
        amount: Money,
        unallocated: Money,
        transferred_transaction_id: Option<AccountTransactionId>,
        ptp_updated: bool,
        is_proven: Option<bool>,
    },
    LateFeeReversed {
        reversal_transaction_id: AccountTransactionId,
        amount: Money,
    },
    NothingToDo {
        reason: String,
    },
    ProvenChecked {
        account_id: AccountId,
        is_proven: Option<bool>,
    },
}

/// Runs a reversal command against `service`
///
/// `Command::Health` needs the concrete database adapter and is handled by
/// the binary.
pub async fn execute<S: RepaymentStore>(
    service: &ReversalService<S>,
    command: Command,
    now: DateTime<Utc>,
) -> Result<CommandReport, WorkerError> {
    match command {
        Command::ReversePayment {
            transaction_id,
            transfer_to,
            note,
        } => {
            let mut request = ReversalRequest::new(transaction_id).at(now);
            if let Some(account_id) = transfer_to {
                request = request.transfer_to(account_id);
            }
            if let Some(note) = note {
                request = request.with_note(note);
            }

            let outcome = service.process_customer_payment_reversal(request).await?;
            Ok(CommandReport::PaymentReversed {
                account_id: outcome.reversal_transaction.account_id,
                reversal_transaction_id: outcome.reversal_transaction.id,
                amount: outcome.reversal_transaction.transaction_amount,
                unallocated: outcome.unallocated,
                transferred_transaction_id: outcome.transferred_transaction.map(|t| t.id),
                ptp_updated: outcome.ptp_updated,
                is_proven: outcome.is_proven,
            })
        }
        Command::ReverseLateFee { transaction_id } => {
            match service.process_late_fee_reversal(transaction_id, now).await? {
                Some(void) => Ok(CommandReport::LateFeeReversed {
                    reversal_transaction_id: void.id,
                    amount: void.transaction_amount,
                }),
                None => Ok(CommandReport::NothingToDo {
                    reason: format!("no late fee left to reverse on {}", transaction_id),
                }),
            }
        }
        Command::ReverseProven { account_id } => {
            let is_proven = service.reverse_is_proven(account_id).await?;
            Ok(CommandReport::ProvenChecked {
                account_id,
                is_proven,
            })
        }
        Command::Health => Ok(CommandReport::NothingToDo {
            reason: "health is checked against the database adapter".to_string(),
        }),
    }
}
