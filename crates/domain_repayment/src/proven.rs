//! Proven customer flag
//!
//! An account is proven once the customer has paid off a loan above the
//! threshold. Reversing a payoff can take that evidence away.

use core_kernel::{AccountId, Money};

use crate::account::{AccountProperty, Loan};
use crate::error::RepaymentError;
use crate::ports::RepaymentTx;

/// Whether the loans still justify the proven flag
pub fn qualifies_as_proven(loans: &[Loan], threshold: Money) -> bool {
    loans
        .iter()
        .any(|loan| loan.is_paid_off() && loan.loan_amount > threshold)
}

/// Re-derives `is_proven` after a reversal, returning the resulting flag
///
/// Only ever clears the flag. Clearing it also clears `concurrency`, which
/// is only granted to proven accounts.
pub fn reverse_is_proven(property: &mut AccountProperty, loans: &[Loan], threshold: Money) -> bool {
    if property.is_proven && !qualifies_as_proven(loans, threshold) {
        property.is_proven = false;
        property.concurrency = false;
    }
    property.is_proven
}

/// Loads, re-derives and persists the account's proven flag
///
/// Returns `None` when the account has no property row.
pub async fn reverse_is_proven_for_account(
    tx: &mut dyn RepaymentTx,
    account_id: AccountId,
    threshold: Money,
) -> Result<Option<bool>, RepaymentError> {
    let Some(mut property) = tx.get_account_property(account_id).await? else {
        return Ok(None);
    };

    let was_proven = property.is_proven;
    let loans = tx.find_loans_for_account(account_id).await?;
    let is_proven = reverse_is_proven(&mut property, &loans, threshold);

    if was_proven != is_proven {
        tracing::info!(account_id = %account_id, "Account is no longer proven");
        tx.save_account_property(&property).await?;
    }

    Ok(Some(is_proven))
}
