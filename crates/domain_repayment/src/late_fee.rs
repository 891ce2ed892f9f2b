//! Late fee reversal
//!
//! A late fee charge is undone by removing whatever part of the fee is still
//! unpaid. Portions the customer already paid stay on the books; undoing
//! those is a payment reversal, not a fee reversal.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

use core_kernel::{AccountTransactionId, Money, Timezone};

use crate::account_payment::AccountPayment;
use crate::error::RepaymentError;
use crate::payment::{Component, Payment};
use crate::payment_event::{PaymentEvent, PaymentEventType};
use crate::ports::RepaymentTx;
use crate::status::{self, refresh_account_payment_status, refresh_payment_status};
use crate::transaction::{AccountTransaction, TransactionType};

/// Builds the void event for `amount` of a late fee event
///
/// The original event is left as is; the void points back at it.
pub fn reverse_late_fee_event(
    payment_event: &PaymentEvent,
    amount: Money,
    due_after: Money,
    void_transaction_id: AccountTransactionId,
    event_date: NaiveDate,
) -> PaymentEvent {
    let mut components = crate::payment::ComponentBreakdown::zero(amount.currency());
    components.add(Component::LateFee, -amount);

    PaymentEvent::new(
        payment_event.payment_id,
        void_transaction_id,
        payment_event.event_type.void_variant(),
        -amount,
        due_after,
        event_date,
    )
    .with_components(components)
    .reversing(payment_event.id)
}

/// Reverses the unpaid part of a late fee transaction
///
/// Returns `Ok(None)` when there is nothing to do: the transaction is not a
/// late fee, carries no late fee events, was already voided, or every fee
/// it charged has been paid.
///
/// A late fee is voided at most once. The part that was paid when it was
/// voided stays charged, even if the repayment covering it is reversed
/// later; removing it then takes a manual adjustment.
pub async fn process_late_fee_reversal(
    tx: &mut dyn RepaymentTx,
    late_fee_transaction_id: AccountTransactionId,
    timezone: &Timezone,
    at: DateTime<Utc>,
) -> Result<Option<AccountTransaction>, RepaymentError> {
    let origin = tx
        .get_account_transaction(late_fee_transaction_id)
        .await?
        .ok_or(RepaymentError::TransactionNotFound(late_fee_transaction_id))?;

    if origin.transaction_type != TransactionType::LateFee {
        tracing::debug!(
            account_transaction_id = %origin.id,
            transaction_type = %origin.transaction_type,
            "Not a late fee transaction"
        );
        return Ok(None);
    }

    tx.lock_account(origin.account_id)
        .await?
        .ok_or(RepaymentError::AccountNotFound(origin.account_id))?;

    if let Some(existing) = tx.find_reversal_of(origin.id).await? {
        tracing::debug!(
            account_transaction_id = %origin.id,
            reversal_id = %existing.id,
            "Late fee already voided"
        );
        return Ok(None);
    }

    let events: Vec<PaymentEvent> = tx
        .find_payment_events_for_transaction(origin.id)
        .await?
        .into_iter()
        .filter(|e| e.event_type == PaymentEventType::LateFee)
        .collect();
    if events.is_empty() {
        return Ok(None);
    }

    let payment_ids: Vec<_> = status::distinct_payment_ids(events.iter().map(|e| e.payment_id));
    let mut payments: HashMap<_, Payment> = tx
        .get_payments(&payment_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut account_payment_ids = Vec::new();
    for payment in payments.values() {
        if !account_payment_ids.contains(&payment.account_payment_id) {
            account_payment_ids.push(payment.account_payment_id);
        }
    }
    let mut account_payments: HashMap<_, AccountPayment> = tx
        .get_account_payments(&account_payment_ids)
        .await?
        .into_iter()
        .map(|ap| (ap.id, ap))
        .collect();

    let today = timezone.local_date(at);
    let mut void =
        AccountTransaction::void_of(&origin, TransactionType::LateFeeVoid, at).booked_in(timezone);
    let currency = origin.transaction_amount.currency();
    let mut total = Money::zero(currency);
    let mut void_events = Vec::new();

    for event in &events {
        let Some(payment) = payments.get_mut(&event.payment_id) else {
            tracing::warn!(
                payment_event_id = %event.id,
                payment_id = %event.payment_id,
                "Late fee event points at a missing payment"
            );
            continue;
        };

        let amount = event.event_payment.abs().min(payment.outstanding(Component::LateFee));
        if !amount.is_positive() {
            tracing::warn!(
                payment_event_id = %event.id,
                payment_id = %payment.id,
                "Late fee already paid, skipping"
            );
            continue;
        }

        payment.remove_late_fee(amount);
        if let Some(account_payment) = account_payments.get_mut(&payment.account_payment_id) {
            account_payment.remove_late_fee(amount);
        }

        void_events.push(reverse_late_fee_event(
            event,
            amount,
            payment.due_amount,
            void.id,
            today,
        ));
        total = total + amount;
    }

    if !total.is_positive() {
        return Ok(None);
    }

    // the charge was booked negative; its void gives back what was removed
    let signed = if origin.transaction_amount.is_negative() { total } else { -total };
    void.transaction_amount = signed;
    void.towards_latefee = signed;

    tx.insert_account_transaction(&void).await?;
    for event in &void_events {
        tx.insert_payment_event(event).await?;
    }
    for payment in payments.values_mut() {
        refresh_payment_status(payment, today);
        tx.save_payment(payment).await?;
    }
    for account_payment in account_payments.values_mut() {
        refresh_account_payment_status(account_payment, today);
        tx.save_account_payment(account_payment).await?;
    }
    let loan_ids = status::distinct_loan_ids(payments.values());
    status::refresh_loan_statuses(tx, &loan_ids, today).await?;

    tracing::info!(
        account_id = %origin.account_id,
        account_transaction_id = %origin.id,
        reversal_id = %void.id,
        amount = %total,
        "Late fee reversed"
    );

    Ok(Some(void))
}
