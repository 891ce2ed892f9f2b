//! Forward repayment waterfall
//!
//! Incoming money is applied to the account's unpaid bills oldest first.
//! Within a bill it pays late fees, then interest, then principal across
//! the bill's installments.

use async_trait::async_trait;
use std::collections::HashMap;

use core_kernel::{DomainPort, Money, PaymentId, Timezone};

use crate::account_payment::AccountPayment;
use crate::consumer::{sort_payments_for_reversal, PaymentReversal};
use crate::error::RepaymentError;
use crate::payment::{Component, ComponentBreakdown, Payment};
use crate::payment_event::{PaymentEvent, PaymentEventType};
use crate::ports::{RepaymentProcessor, RepaymentRequest, RepaymentTx};
use crate::status::{self, refresh_account_payment_status, refresh_payment_status};
use crate::transaction::{AccountTransaction, TransactionType};

/// Default [`RepaymentProcessor`]
#[derive(Debug, Clone, Default)]
pub struct WaterfallRepaymentProcessor {
    timezone: Timezone,
}

impl DomainPort for WaterfallRepaymentProcessor {}

impl WaterfallRepaymentProcessor {
    pub fn new(timezone: Timezone) -> Self {
        Self { timezone }
    }
}

/// Applies `amount` to one bill in precedence order
///
/// Returns what was applied per installment; `amount` is reduced in place.
pub fn apply_in_precedence(
    payments: &mut [Payment],
    amount: &mut Money,
    account_payment: &mut AccountPayment,
) -> Vec<PaymentReversal> {
    let mut applied: Vec<PaymentReversal> = Vec::new();

    for component in Component::PRECEDENCE {
        for payment in payments.iter_mut() {
            if !amount.is_positive() {
                return applied;
            }

            let take = amount.min(payment.outstanding(component));
            if !take.is_positive() {
                continue;
            }

            payment.apply(component, take);
            account_payment.apply(component, take);
            *amount = *amount - take;

            match applied.iter_mut().find(|a| a.payment_id == payment.id) {
                Some(entry) => entry.components.add(component, take),
                None => {
                    let mut components = ComponentBreakdown::zero(take.currency());
                    components.add(component, take);
                    applied.push(PaymentReversal {
                        payment_id: payment.id,
                        components,
                    });
                }
            }
        }
    }

    applied
}

#[async_trait]
impl RepaymentProcessor for WaterfallRepaymentProcessor {
    async fn process_repayment_trx(
        &self,
        tx: &mut dyn RepaymentTx,
        request: RepaymentRequest,
    ) -> Result<Option<AccountTransaction>, RepaymentError> {
        let mut payback = request.payback;
        if payback.is_processed {
            tracing::warn!(
                payback_transaction_id = %payback.id,
                "Payback transaction already processed"
            );
            return Ok(None);
        }

        let account_id = payback.account_id;
        tx.lock_account(account_id)
            .await?
            .ok_or(RepaymentError::AccountNotFound(account_id))?;

        let mut account_payments = tx.find_unpaid_account_payments(account_id).await?;
        account_payments.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
        let account_payment_ids: Vec<_> = account_payments.iter().map(|ap| ap.id).collect();
        let mut payments = tx.find_payments_for_account_payments(&account_payment_ids).await?;
        sort_payments_for_reversal(&mut payments);

        let paid_on = self.timezone.local_date(request.at);
        let currency = payback.amount.currency();
        let mut remaining = payback.amount;
        let mut trx = AccountTransaction::new(
            account_id,
            TransactionType::Payment,
            Money::zero(currency),
            request.at,
        )
        .booked_in(&self.timezone)
        .with_payback(payback.id);
        if let Some(note) = request.note {
            trx = trx.with_note(note);
        }

        let mut touched: Vec<Payment> = Vec::new();
        let mut applied: Vec<PaymentReversal> = Vec::new();
        let mut applied_per_bill: HashMap<_, Money> = HashMap::new();
        let mut breakdown = ComponentBreakdown::zero(currency);

        for account_payment in account_payments.iter_mut() {
            if !remaining.is_positive() {
                break;
            }

            let (mut group, rest): (Vec<Payment>, Vec<Payment>) = payments
                .into_iter()
                .partition(|p| p.account_payment_id == account_payment.id);
            payments = rest;

            let before = remaining;
            let bill_applied = apply_in_precedence(&mut group, &mut remaining, account_payment);
            if bill_applied.is_empty() {
                continue;
            }

            account_payment.paid_date = Some(paid_on);
            applied_per_bill.insert(account_payment.id, before - remaining);
            for entry in &bill_applied {
                for component in Component::PRECEDENCE {
                    breakdown.add(component, entry.components.get(component));
                }
            }
            for payment in group.iter_mut() {
                if bill_applied.iter().any(|a| a.payment_id == payment.id) {
                    payment.paid_date = Some(paid_on);
                }
            }
            applied.extend(bill_applied);
            touched.extend(group);
        }

        let total_applied = breakdown.total();
        if !total_applied.is_positive() {
            tracing::warn!(
                account_id = %account_id,
                payback_transaction_id = %payback.id,
                "Nothing due on account, repayment not applied"
            );
            return Ok(None);
        }
        if remaining.is_positive() {
            tracing::warn!(
                account_id = %account_id,
                payback_transaction_id = %payback.id,
                excess = %remaining,
                "Repayment exceeds amount due"
            );
        }

        trx.transaction_amount = total_applied;
        trx = trx.with_components(breakdown);
        tx.insert_account_transaction(&trx).await?;

        let by_id: HashMap<PaymentId, &Payment> = touched.iter().map(|p| (p.id, p)).collect();
        for entry in &applied {
            let Some(payment) = by_id.get(&entry.payment_id) else {
                continue;
            };
            let event = PaymentEvent::new(
                payment.id,
                trx.id,
                PaymentEventType::Payment,
                entry.total(),
                payment.due_amount,
                paid_on,
            )
            .with_components(entry.components);
            tx.insert_payment_event(&event).await?;
        }

        for payment in touched.iter_mut() {
            refresh_payment_status(payment, paid_on);
            tx.save_payment(payment).await?;
        }
        for account_payment in account_payments.iter_mut() {
            if applied_per_bill.contains_key(&account_payment.id) {
                refresh_account_payment_status(account_payment, paid_on);
                tx.save_account_payment(account_payment).await?;
            }
        }
        let loan_ids = status::distinct_loan_ids(touched.iter());
        status::refresh_loan_statuses(tx, &loan_ids, paid_on).await?;

        for (account_payment_id, amount) in &applied_per_bill {
            let Some(mut ptp) = tx.find_latest_ptp_for_account_payment(*account_payment_id).await?
            else {
                continue;
            };
            ptp.record_payment(trx.id, *amount, paid_on);
            tx.save_ptp(&ptp).await?;
        }

        payback.is_processed = true;
        tx.save_payback_transaction(&payback).await?;

        tracing::info!(
            account_id = %account_id,
            account_transaction_id = %trx.id,
            amount = %total_applied,
            cashback_experiment = request.cashback_experiment,
            "Repayment applied"
        );

        Ok(Some(trx))
    }
}
