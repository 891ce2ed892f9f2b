//! Test Data Builders
//!
//! Provides builder patterns for constructing test ledgers with sensible
//! defaults. Tests describe only the loans and charges they care about; the
//! builder derives bills, statuses and the account property.

use chrono::{Months, NaiveDate};

use core_kernel::{AccountPaymentId, Currency, CustomerId, Money};
use domain_repayment::status::paid_status;
use domain_repayment::{
    Account, AccountPayment, AccountProperty, Component, Loan, LoanStatus, Payment, Ptp,
};

use crate::fixtures::{TemporalFixtures, STANDARD_INTEREST, STANDARD_PRINCIPAL};
use crate::store::{InMemoryRepaymentStore, LedgerState};

struct LoanPlan {
    loan_amount: Money,
    installments: Vec<(Money, Money)>,
    first_due: NaiveDate,
    status: LoanStatus,
}

/// An account with its loans, bills and installments
#[derive(Debug, Clone)]
pub struct AccountScenario {
    pub account: Account,
    pub property: AccountProperty,
    pub loans: Vec<Loan>,
    /// Bills ordered by due date
    pub account_payments: Vec<AccountPayment>,
    /// Installments per loan, in due date order
    pub payments: Vec<Vec<Payment>>,
    pub ptps: Vec<Ptp>,
}

impl AccountScenario {
    /// Installment `number` (1-based) of loan `loan_index`
    ///
    /// # Panics
    ///
    /// Panics if the loan or installment does not exist.
    pub fn payment(&self, loan_index: usize, number: usize) -> &Payment {
        &self.payments[loan_index][number - 1]
    }

    pub fn bill(&self, index: usize) -> &AccountPayment {
        &self.account_payments[index]
    }

    /// Adds this scenario to an existing ledger
    pub fn seed_into(&self, state: &mut LedgerState) {
        state.accounts.insert(self.account.id, self.account.clone());
        state
            .account_properties
            .insert(self.account.id, self.property.clone());
        for loan in &self.loans {
            state.loans.insert(loan.id, loan.clone());
        }
        for bill in &self.account_payments {
            state.account_payments.insert(bill.id, bill.clone());
        }
        for payment in self.payments.iter().flatten() {
            state.payments.insert(payment.id, payment.clone());
        }
        state.ptps.extend(self.ptps.iter().cloned());
    }

    pub fn to_state(&self) -> LedgerState {
        let mut state = LedgerState::default();
        self.seed_into(&mut state);
        state
    }

    /// Creates an in-memory store holding only this scenario
    pub fn store(&self) -> InMemoryRepaymentStore {
        InMemoryRepaymentStore::with_state(self.to_state())
    }
}

/// Builder for [`AccountScenario`]
pub struct AccountScenarioBuilder {
    customer_id: CustomerId,
    currency: Currency,
    loans: Vec<LoanPlan>,
    late_fees: Vec<(usize, usize, Money)>,
    ptps: Vec<(usize, NaiveDate, Money)>,
    is_proven: bool,
}

impl Default for AccountScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountScenarioBuilder {
    /// Creates a builder for an account without loans
    pub fn new() -> Self {
        Self {
            customer_id: CustomerId::new(),
            currency: Currency::IDR,
            loans: Vec::new(),
            late_fees: Vec::new(),
            ptps: Vec::new(),
            is_proven: false,
        }
    }

    /// Adds a loan with monthly installments starting at `first_due`
    ///
    /// Each installment is given as `(principal, interest)` in whole rupiah.
    pub fn with_loan(
        mut self,
        loan_amount: Money,
        installments: &[(i64, i64)],
        first_due: NaiveDate,
    ) -> Self {
        self.loans.push(LoanPlan {
            loan_amount,
            installments: installments
                .iter()
                .map(|(p, i)| (Money::idr(*p), Money::idr(*i)))
                .collect(),
            first_due,
            status: LoanStatus::Current,
        });
        self
    }

    /// Adds a loan of three standard installments due from the first fixture date
    pub fn with_standard_loan(self) -> Self {
        let (p, i) = (STANDARD_PRINCIPAL, STANDARD_INTEREST);
        self.with_loan(
            Money::idr(p * 3),
            &[(p, i), (p, i), (p, i)],
            TemporalFixtures::first_due_date(),
        )
    }

    /// Marks the most recently added loan as paid off
    ///
    /// Its installments are set fully paid.
    pub fn paid_off(mut self) -> Self {
        if let Some(plan) = self.loans.last_mut() {
            plan.status = LoanStatus::PaidOff;
        }
        self
    }

    /// Charges a late fee on installment `number` (1-based) of loan `loan_index`
    pub fn with_late_fee(mut self, loan_index: usize, number: usize, amount: Money) -> Self {
        self.late_fees.push((loan_index, number, amount));
        self
    }

    /// Records a promise to pay on bill `bill_index`
    pub fn with_ptp(mut self, bill_index: usize, ptp_date: NaiveDate, amount: Money) -> Self {
        self.ptps.push((bill_index, ptp_date, amount));
        self
    }

    pub fn proven(mut self, is_proven: bool) -> Self {
        self.is_proven = is_proven;
        self
    }

    /// Builds the scenario
    ///
    /// # Panics
    ///
    /// Panics if a late fee or promise refers to a missing loan, installment
    /// or bill.
    pub fn build(self) -> AccountScenario {
        let account = Account::new(self.customer_id);
        let mut property = AccountProperty::new(account.id);
        property.is_proven = self.is_proven;
        property.concurrency = self.is_proven;

        let mut bills: Vec<AccountPayment> = Vec::new();
        let mut loans = Vec::new();
        let mut payments: Vec<Vec<Payment>> = Vec::new();

        for plan in &self.loans {
            let mut loan = Loan::new(account.id, plan.loan_amount);
            loan.status = plan.status;

            let mut installments = Vec::new();
            for (n, (principal, interest)) in plan.installments.iter().enumerate() {
                let due_date = plan
                    .first_due
                    .checked_add_months(Months::new(n as u32))
                    .expect("due date in range");
                let bill_id = bill_for(&mut bills, account.id, due_date, self.currency);
                let mut payment =
                    Payment::new(loan.id, bill_id, n as i32 + 1, due_date, *principal, *interest);
                if plan.status == LoanStatus::PaidOff {
                    payment.apply(Component::Interest, *interest);
                    payment.apply(Component::Principal, *principal);
                    payment.paid_date = Some(due_date);
                    payment.status = paid_status(due_date, due_date);
                }
                installments.push(payment);
            }

            loans.push(loan);
            payments.push(installments);
        }

        for (loan_index, number, amount) in &self.late_fees {
            payments[*loan_index][*number - 1].charge_late_fee(*amount);
        }

        bills.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        for bill in bills.iter_mut() {
            let id = bill.id;
            bill.recompute_from(payments.iter().flatten().filter(|p| p.account_payment_id == id));
            if bill.is_fully_paid() {
                bill.paid_date = Some(bill.due_date);
                bill.status = paid_status(bill.due_date, bill.due_date);
            }
        }

        let ptps = self
            .ptps
            .iter()
            .map(|(bill_index, date, amount)| {
                Ptp::new(account.id, bills[*bill_index].id, *date, *amount)
            })
            .collect();

        AccountScenario {
            account,
            property,
            loans,
            account_payments: bills,
            payments,
            ptps,
        }
    }
}

fn bill_for(
    bills: &mut Vec<AccountPayment>,
    account_id: core_kernel::AccountId,
    due_date: NaiveDate,
    currency: Currency,
) -> AccountPaymentId {
    if let Some(bill) = bills.iter().find(|b| b.due_date == due_date) {
        return bill.id;
    }
    let bill = AccountPayment::new(account_id, due_date, currency);
    let id = bill.id;
    bills.push(bill);
    id
}
