//! Per-installment ledger entries

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{AccountTransactionId, Money, PaymentEventId, PaymentId};

use crate::payment::ComponentBreakdown;

/// Kind of installment-level event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventType {
    Payment,
    PaymentVoid,
    LateFee,
    LateFeeVoid,
}

impl PaymentEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentEventType::Payment => "payment",
            PaymentEventType::PaymentVoid => "payment_void",
            PaymentEventType::LateFee => "late_fee",
            PaymentEventType::LateFeeVoid => "late_fee_void",
        }
    }

    /// The void variant used to reverse an event of this type
    pub fn void_variant(&self) -> PaymentEventType {
        match self {
            PaymentEventType::Payment | PaymentEventType::PaymentVoid => {
                PaymentEventType::PaymentVoid
            }
            PaymentEventType::LateFee | PaymentEventType::LateFeeVoid => {
                PaymentEventType::LateFeeVoid
            }
        }
    }
}

impl fmt::Display for PaymentEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(PaymentEventType::Payment),
            "payment_void" => Ok(PaymentEventType::PaymentVoid),
            "late_fee" => Ok(PaymentEventType::LateFee),
            "late_fee_void" => Ok(PaymentEventType::LateFeeVoid),
            other => Err(format!("unknown payment event type: {}", other)),
        }
    }
}

/// Money applied to (or charged on) one installment by one account transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: PaymentEventId,
    pub payment_id: PaymentId,
    pub account_transaction_id: AccountTransactionId,
    pub event_type: PaymentEventType,
    pub event_payment: Money,
    /// Installment due amount right after the event
    pub event_due_amount: Money,
    pub event_date: NaiveDate,
    /// Set on void events; the event being reversed
    pub reversed_event_id: Option<PaymentEventId>,
    pub components: ComponentBreakdown,
}

impl PaymentEvent {
    pub fn new(
        payment_id: PaymentId,
        account_transaction_id: AccountTransactionId,
        event_type: PaymentEventType,
        event_payment: Money,
        event_due_amount: Money,
        event_date: NaiveDate,
    ) -> Self {
        Self {
            id: PaymentEventId::new_v7(),
            payment_id,
            account_transaction_id,
            event_type,
            event_payment,
            event_due_amount,
            event_date,
            reversed_event_id: None,
            components: ComponentBreakdown::zero(event_payment.currency()),
        }
    }

    pub fn with_components(mut self, components: ComponentBreakdown) -> Self {
        self.components = components;
        self
    }

    pub fn reversing(mut self, event_id: PaymentEventId) -> Self {
        self.reversed_event_id = Some(event_id);
        self
    }
}
