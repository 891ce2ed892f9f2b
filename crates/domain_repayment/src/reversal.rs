//! Customer payment reversal
//!
//! Voids a previously applied repayment: writes the negated ledger entry,
//! takes the money back off the bills it paid (late fee, then interest,
//! then principal), optionally re-applies it to another account, and walks
//! back the promise-to-pay and proven flags that depended on it. All of it
//! happens in one store transaction.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use core_kernel::{AccountId, AccountPaymentId, AccountTransactionId, Currency, Money, PaymentId};

use crate::account_payment::AccountPayment;
use crate::consumer::{consume_reversal_in_precedence, sort_payments_for_reversal, PaymentReversal};
use crate::error::RepaymentError;
use crate::late_fee;
use crate::payment::{ComponentBreakdown, Payment};
use crate::payment_event::{PaymentEvent, PaymentEventType};
use crate::policy::{OverReversalPolicy, ReversalPolicy};
use crate::ports::{RepaymentProcessor, RepaymentRequest, RepaymentStore, RepaymentTx};
use crate::proven::reverse_is_proven_for_account;
use crate::repayment::WaterfallRepaymentProcessor;
use crate::snapshot::{construct_loan_payments_list, construct_old_paid_amount_list, LoanPayments};
use crate::status::{self, refresh_account_payment_status, refresh_payment_status};
use crate::transaction::{AccountTransaction, PaybackTransaction, TransactionType};

/// A request to void a customer repayment
#[derive(Debug, Clone)]
pub struct ReversalRequest {
    pub account_transaction_id: AccountTransactionId,
    /// Account the freed money should be re-applied to, if any
    pub destination_account_id: Option<AccountId>,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

impl ReversalRequest {
    pub fn new(account_transaction_id: AccountTransactionId) -> Self {
        Self {
            account_transaction_id,
            destination_account_id: None,
            note: None,
            at: Utc::now(),
        }
    }

    pub fn transfer_to(mut self, account_id: AccountId) -> Self {
        self.destination_account_id = Some(account_id);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

/// Everything a committed reversal wrote or changed
#[derive(Debug, Clone)]
pub struct ReversalOutcome {
    pub reversal_transaction: AccountTransaction,
    pub void_events: Vec<PaymentEvent>,
    /// Repayment written on the destination account, if funds were transferred
    pub transferred_transaction: Option<AccountTransaction>,
    /// Amount taken back per component
    pub reversed: ComponentBreakdown,
    /// Part of the reversal that no paid amount could absorb
    pub unallocated: Money,
    pub ptp_updated: bool,
    /// Proven flag after the reversal; `None` when the account has no property row
    pub is_proven: Option<bool>,
    /// Installments whose paid amount changed, grouped by loan
    pub loan_payments: Vec<LoanPayments>,
}

/// Result of re-applying reversed funds
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub payback_transaction: PaybackTransaction,
    pub transaction: Option<AccountTransaction>,
    pub ptp_updated: bool,
}

/// Runs reversals against a [`RepaymentStore`]
pub struct ReversalService<S: RepaymentStore> {
    store: Arc<S>,
    processor: Arc<dyn RepaymentProcessor>,
    policy: ReversalPolicy,
}

impl<S: RepaymentStore> ReversalService<S> {
    /// Creates a service using the waterfall processor for transfers
    pub fn new(store: Arc<S>, policy: ReversalPolicy) -> Self {
        let processor = Arc::new(WaterfallRepaymentProcessor::new(policy.timezone));
        Self {
            store,
            processor,
            policy,
        }
    }

    pub fn with_processor(mut self, processor: Arc<dyn RepaymentProcessor>) -> Self {
        self.processor = processor;
        self
    }

    pub fn policy(&self) -> &ReversalPolicy {
        &self.policy
    }

    /// Voids a repayment and commits the result
    ///
    /// Nothing is persisted when this returns an error.
    pub async fn process_customer_payment_reversal(
        &self,
        request: ReversalRequest,
    ) -> Result<ReversalOutcome, RepaymentError> {
        let mut tx = self.store.begin().await?;
        let outcome = reverse_customer_payment(
            &mut tx,
            self.processor.as_ref(),
            &self.policy,
            &request,
        )
        .await?;
        self.store.commit(tx).await?;

        tracing::info!(
            account_id = %outcome.reversal_transaction.account_id,
            origin_id = %request.account_transaction_id,
            reversal_id = %outcome.reversal_transaction.id,
            amount = %outcome.reversed.total(),
            transferred = outcome.transferred_transaction.is_some(),
            "Customer payment reversed"
        );

        Ok(outcome)
    }

    /// Reverses the unpaid part of a late fee in its own transaction
    pub async fn process_late_fee_reversal(
        &self,
        late_fee_transaction_id: AccountTransactionId,
        at: DateTime<Utc>,
    ) -> Result<Option<AccountTransaction>, RepaymentError> {
        let mut tx = self.store.begin().await?;
        let void = late_fee::process_late_fee_reversal(
            &mut tx,
            late_fee_transaction_id,
            &self.policy.timezone,
            at,
        )
        .await?;
        if void.is_some() {
            self.store.commit(tx).await?;
        }
        Ok(void)
    }

    /// Re-derives the account's proven flag in its own transaction
    pub async fn reverse_is_proven(
        &self,
        account_id: AccountId,
    ) -> Result<Option<bool>, RepaymentError> {
        let mut tx = self.store.begin().await?;
        let is_proven =
            reverse_is_proven_for_account(&mut tx, account_id, self.policy.proven_threshold).await?;
        self.store.commit(tx).await?;
        Ok(is_proven)
    }
}

/// Runs a full reversal inside `tx` without committing it
pub async fn reverse_customer_payment(
    tx: &mut dyn RepaymentTx,
    processor: &dyn RepaymentProcessor,
    policy: &ReversalPolicy,
    request: &ReversalRequest,
) -> Result<ReversalOutcome, RepaymentError> {
    let origin_id = request.account_transaction_id;
    let origin = tx
        .get_account_transaction(origin_id)
        .await?
        .ok_or(RepaymentError::TransactionNotFound(origin_id))?;

    if origin.transaction_type != TransactionType::Payment {
        return Err(RepaymentError::not_reversible(
            origin_id,
            format!("transaction type is {}", origin.transaction_type),
        ));
    }
    if !origin.transaction_amount.is_positive() {
        return Err(RepaymentError::not_reversible(origin_id, "amount is not positive"));
    }
    let payback_id = origin
        .payback_transaction_id
        .ok_or(RepaymentError::MissingPaybackTransaction(origin_id))?;
    tx.get_payback_transaction(payback_id)
        .await?
        .ok_or(RepaymentError::MissingPaybackTransaction(origin_id))?;

    tx.lock_account(origin.account_id)
        .await?
        .ok_or(RepaymentError::AccountNotFound(origin.account_id))?;

    if let Some(existing) = tx.find_reversal_of(origin_id).await? {
        return Err(RepaymentError::AlreadyReversed {
            origin: origin_id,
            reversal: existing.id,
        });
    }

    let events: Vec<PaymentEvent> = tx
        .find_payment_events_for_transaction(origin_id)
        .await?
        .into_iter()
        .filter(|e| e.event_type == PaymentEventType::Payment)
        .collect();
    if events.is_empty() {
        return Err(RepaymentError::NoPaymentEvents(origin_id));
    }

    let payment_ids = status::distinct_payment_ids(events.iter().map(|e| e.payment_id));
    let mut payments = tx.get_payments(&payment_ids).await?;
    sort_payments_for_reversal(&mut payments);

    let mut account_payment_ids = Vec::new();
    for payment in &payments {
        if !account_payment_ids.contains(&payment.account_payment_id) {
            account_payment_ids.push(payment.account_payment_id);
        }
    }
    let mut account_payments = tx.get_account_payments(&account_payment_ids).await?;
    account_payments.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));

    let old_paid_amounts = construct_old_paid_amount_list(&payments);
    let today = policy.timezone.local_date(request.at);
    let currency = origin.transaction_amount.currency();

    let mut void = AccountTransaction::void_of(&origin, TransactionType::PaymentVoid, request.at)
        .booked_in(&policy.timezone);
    if let Some(note) = &request.note {
        void = void.with_note(note.clone());
    }

    let paid_per_bill = amounts_per_bill(&events, &payments);
    let unwound =
        unwind_account_payments(&mut payments, &mut account_payments, &paid_per_bill, currency);
    let reversed_total = unwound.reversed.total();
    if !reversed_total.is_positive() {
        return Err(RepaymentError::NothingToReverse(origin_id));
    }

    if unwound.remaining.is_positive() {
        match policy.over_reversal {
            OverReversalPolicy::Reject => {
                return Err(RepaymentError::OverReversal {
                    origin: origin_id,
                    remaining: unwound.remaining,
                });
            }
            OverReversalPolicy::LogAndContinue => {
                tracing::warn!(
                    account_id = %origin.account_id,
                    origin_id = %origin_id,
                    remaining = %unwound.remaining,
                    "Reversal exceeds paid amounts, remainder left unallocated"
                );
            }
        }
    }

    void = void.with_components(unwound.reversed.negated());
    tx.insert_account_transaction(&void).await?;

    let mut void_events = Vec::with_capacity(unwound.per_payment.len());
    for entry in &unwound.per_payment {
        let Some(payment) = payments.iter().find(|p| p.id == entry.payment_id) else {
            continue;
        };
        let original = events.iter().find(|e| e.payment_id == entry.payment_id);
        let mut event = PaymentEvent::new(
            payment.id,
            void.id,
            PaymentEventType::PaymentVoid,
            -entry.total(),
            payment.due_amount,
            today,
        )
        .with_components(entry.components.negated());
        if let Some(original) = original {
            event = event.reversing(original.id);
        }
        tx.insert_payment_event(&event).await?;
        void_events.push(event);
    }

    persist_unwound(tx, &mut payments, &mut account_payments, &unwound.per_payment, today).await?;
    let loan_payments = construct_loan_payments_list(&payments, &old_paid_amounts);

    let (transferred_transaction, ptp_updated) = match request.destination_account_id {
        Some(destination) => {
            let transfer = transfer_payment_after_reversal(
                tx,
                processor,
                &origin,
                destination,
                &void,
                policy,
                request.at,
            )
            .await?;
            (transfer.transaction, transfer.ptp_updated)
        }
        None => {
            let updated =
                update_ptp_status_for_origin_account_transaction(tx, &origin, today).await?;
            (None, updated)
        }
    };

    let is_proven =
        reverse_is_proven_for_account(tx, origin.account_id, policy.proven_threshold).await?;

    Ok(ReversalOutcome {
        reversal_transaction: void,
        void_events,
        transferred_transaction,
        reversed: unwound.reversed,
        unallocated: if unwound.remaining.is_positive() {
            unwound.remaining
        } else {
            Money::zero(currency)
        },
        ptp_updated,
        is_proven,
        loan_payments,
    })
}

struct Unwound {
    remaining: Money,
    reversed: ComponentBreakdown,
    per_payment: Vec<PaymentReversal>,
}

/// Sums the origin's payment events per bill
///
/// Events whose installment could not be loaded are left out.
fn amounts_per_bill(
    events: &[PaymentEvent],
    payments: &[Payment],
) -> HashMap<AccountPaymentId, Money> {
    let mut per_bill: HashMap<AccountPaymentId, Money> = HashMap::new();
    for event in events {
        let Some(payment) = payments.iter().find(|p| p.id == event.payment_id) else {
            continue;
        };
        per_bill
            .entry(payment.account_payment_id)
            .and_modify(|total| *total = *total + event.event_payment)
            .or_insert(event.event_payment);
    }
    per_bill
}

/// Runs the consumers over each bill, oldest first
///
/// Each bill gives back at most what the origin paid on it. Whatever a bill
/// cannot absorb is left in `remaining` and never taken from another bill,
/// so money other transactions paid stays where it is.
fn unwind_account_payments(
    payments: &mut Vec<Payment>,
    account_payments: &mut [AccountPayment],
    paid_per_bill: &HashMap<AccountPaymentId, Money>,
    currency: Currency,
) -> Unwound {
    let mut unwound = Unwound {
        remaining: Money::zero(currency),
        reversed: ComponentBreakdown::zero(currency),
        per_payment: Vec::new(),
    };

    for (bill_id, amount) in paid_per_bill {
        if !account_payments.iter().any(|ap| ap.id == *bill_id) {
            unwound.remaining = unwound.remaining + *amount;
        }
    }

    let mut pending = std::mem::take(payments);
    for account_payment in account_payments.iter_mut() {
        let (mut group, rest): (Vec<Payment>, Vec<Payment>) = pending
            .into_iter()
            .partition(|p| p.account_payment_id == account_payment.id);
        pending = rest;

        let Some(amount) = paid_per_bill.get(&account_payment.id).copied() else {
            payments.extend(group);
            continue;
        };
        let result = consume_reversal_in_precedence(&mut group, amount, account_payment);
        unwound.remaining = unwound.remaining + result.remaining;
        for component in crate::payment::Component::PRECEDENCE {
            unwound.reversed.add(component, result.reversed.get(component));
        }
        unwound.per_payment.extend(result.per_payment);
        payments.extend(group);
    }
    // installments whose bill could not be loaded are kept untouched
    payments.extend(pending);
    sort_payments_for_reversal(payments);

    unwound
}

async fn persist_unwound(
    tx: &mut dyn RepaymentTx,
    payments: &mut [Payment],
    account_payments: &mut [AccountPayment],
    per_payment: &[PaymentReversal],
    today: NaiveDate,
) -> Result<(), RepaymentError> {
    let touched: Vec<PaymentId> = per_payment.iter().map(|p| p.payment_id).collect();

    for payment in payments.iter_mut().filter(|p| touched.contains(&p.id)) {
        refresh_payment_status(payment, today);
        tx.save_payment(payment).await?;
    }
    for account_payment in account_payments.iter_mut() {
        refresh_account_payment_status(account_payment, today);
        tx.save_account_payment(account_payment).await?;
    }

    let loan_ids = status::distinct_loan_ids(payments.iter().filter(|p| touched.contains(&p.id)));
    status::refresh_loan_statuses(tx, &loan_ids, today).await?;
    Ok(())
}

/// Re-applies the reversed money to `destination_account_id`
///
/// A new payback transaction is written on the destination account, copying
/// the gateway details of the original, and handed to the repayment
/// processor. The promise tied to the origin transaction is then reset.
pub async fn transfer_payment_after_reversal(
    tx: &mut dyn RepaymentTx,
    processor: &dyn RepaymentProcessor,
    origin: &AccountTransaction,
    destination_account_id: AccountId,
    reversal: &AccountTransaction,
    policy: &ReversalPolicy,
    at: DateTime<Utc>,
) -> Result<TransferOutcome, RepaymentError> {
    let origin_payback = match origin.payback_transaction_id {
        Some(id) => tx.get_payback_transaction(id).await?,
        None => None,
    }
    .ok_or(RepaymentError::MissingPaybackTransaction(origin.id))?;

    let mut payback = PaybackTransaction::new(
        destination_account_id,
        -reversal.transaction_amount,
        origin_payback.payback_service.clone(),
        at,
    );
    payback.transaction_id = origin_payback.transaction_id.clone();
    tx.insert_payback_transaction(&payback).await?;

    let mut request = RepaymentRequest::new(payback.clone())
        .with_note(format!("transfer from {}", origin.id))
        .with_cashback_experiment(policy.cashback_experiment);
    request.at = at;

    let transaction = processor.process_repayment_trx(tx, request).await?;
    if transaction.is_none() {
        tracing::warn!(
            destination_account_id = %destination_account_id,
            origin_id = %origin.id,
            "Transferred funds could not be applied on destination account"
        );
    }

    let today = policy.timezone.local_date(at);
    let ptp_updated = update_ptp_status_for_origin_account_transaction(tx, origin, today).await?;

    Ok(TransferOutcome {
        payback_transaction: payback,
        transaction,
        ptp_updated,
    })
}

/// Takes a voided repayment back off the promises it kept
///
/// A repayment spread over several bills credits the latest promise on each
/// of them, so every bill's latest promise linked to `origin` is reset by
/// what `origin` paid on that bill. Returns whether any promise was updated.
pub async fn update_ptp_status_for_origin_account_transaction(
    tx: &mut dyn RepaymentTx,
    origin: &AccountTransaction,
    today: NaiveDate,
) -> Result<bool, RepaymentError> {
    let ptps = tx.find_ptps_for_transaction(origin.id).await?;
    if ptps.is_empty() {
        return Ok(false);
    }

    let events: Vec<PaymentEvent> = tx
        .find_payment_events_for_transaction(origin.id)
        .await?
        .into_iter()
        .filter(|e| e.event_type == PaymentEventType::Payment)
        .collect();
    let payment_ids = status::distinct_payment_ids(events.iter().map(|e| e.payment_id));
    let payments = tx.get_payments(&payment_ids).await?;
    let paid_per_bill = amounts_per_bill(&events, &payments);

    let mut seen: Vec<AccountPaymentId> = Vec::new();
    let mut updated = false;
    // newest first, so the first promise seen per bill is its latest
    for mut ptp in ptps {
        if seen.contains(&ptp.account_payment_id) {
            continue;
        }
        seen.push(ptp.account_payment_id);

        let Some(voided) = paid_per_bill.get(&ptp.account_payment_id).copied() else {
            continue;
        };
        if !ptp.reset_for_voided_payment(voided, today) {
            continue;
        }

        tracing::info!(
            ptp_id = %ptp.id,
            origin_id = %origin.id,
            voided = %voided,
            status = ptp.ptp_status.map(|s| s.as_str()).unwrap_or("none"),
            "Promise to pay reset after reversal"
        );
        tx.save_ptp(&ptp).await?;
        updated = true;
    }
    Ok(updated)
}
