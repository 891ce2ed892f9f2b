//! Repayment repository implementation
//!
//! Row types for the repayment ledger tables and the queries that read and
//! write them. Every function takes a connection so callers decide which
//! transaction the statement runs in.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use core_kernel::{
    AccountId, AccountPaymentId, AccountTransactionId, Currency, CustomerId, LoanId, Money,
    PaybackTransactionId, PaymentEventId, PaymentId, PtpId,
};
use domain_repayment::{
    Account, AccountPayment, AccountProperty, AccountStatus, AccountTransaction, ComponentBreakdown,
    Loan, LoanStatus, PaybackTransaction, Payment, PaymentEvent, PaymentStatus, Ptp,
};

use crate::error::DatabaseError;

/// Row in `accounts`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status_code: i32,
}

impl AccountRow {
    pub fn into_domain(self) -> Result<Account, DatabaseError> {
        Ok(Account {
            id: AccountId::from_uuid(self.id),
            customer_id: CustomerId::from_uuid(self.customer_id),
            status: AccountStatus::from_code(self.status_code).ok_or_else(|| {
                DatabaseError::invalid_value("accounts.status_code", self.status_code)
            })?,
        })
    }
}

/// Row in `account_properties`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountPropertyRow {
    pub account_id: Uuid,
    pub is_proven: bool,
    pub concurrency: bool,
}

impl From<AccountPropertyRow> for AccountProperty {
    fn from(row: AccountPropertyRow) -> Self {
        AccountProperty {
            account_id: AccountId::from_uuid(row.account_id),
            is_proven: row.is_proven,
            concurrency: row.concurrency,
        }
    }
}

/// Row in `loans`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LoanRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub loan_amount: Decimal,
    pub status_code: i32,
}

impl LoanRow {
    pub fn into_domain(self, currency: Currency) -> Result<Loan, DatabaseError> {
        Ok(Loan {
            id: LoanId::from_uuid(self.id),
            account_id: AccountId::from_uuid(self.account_id),
            loan_amount: Money::new(self.loan_amount, currency),
            status: LoanStatus::from_code(self.status_code).ok_or_else(|| {
                DatabaseError::invalid_value("loans.status_code", self.status_code)
            })?,
        })
    }
}

/// Row in `payments`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub account_payment_id: Uuid,
    pub payment_number: i32,
    pub due_date: NaiveDate,
    pub due_amount: Decimal,
    pub installment_principal: Decimal,
    pub installment_interest: Decimal,
    pub late_fee_amount: Decimal,
    pub paid_amount: Decimal,
    pub paid_principal: Decimal,
    pub paid_interest: Decimal,
    pub paid_late_fee: Decimal,
    pub paid_date: Option<NaiveDate>,
    pub status_code: i32,
}

impl PaymentRow {
    pub fn into_domain(self, currency: Currency) -> Result<Payment, DatabaseError> {
        let money = |d: Decimal| Money::new(d, currency);
        Ok(Payment {
            id: PaymentId::from_uuid(self.id),
            loan_id: LoanId::from_uuid(self.loan_id),
            account_payment_id: AccountPaymentId::from_uuid(self.account_payment_id),
            payment_number: self.payment_number,
            due_date: self.due_date,
            due_amount: money(self.due_amount),
            installment_principal: money(self.installment_principal),
            installment_interest: money(self.installment_interest),
            late_fee_amount: money(self.late_fee_amount),
            paid_amount: money(self.paid_amount),
            paid_principal: money(self.paid_principal),
            paid_interest: money(self.paid_interest),
            paid_late_fee: money(self.paid_late_fee),
            paid_date: self.paid_date,
            status: PaymentStatus::from_code(self.status_code).ok_or_else(|| {
                DatabaseError::invalid_value("payments.status_code", self.status_code)
            })?,
        })
    }
}

/// Row in `account_payments`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountPaymentRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub due_date: NaiveDate,
    pub due_amount: Decimal,
    pub principal_amount: Decimal,
    pub interest_amount: Decimal,
    pub late_fee_amount: Decimal,
    pub paid_amount: Decimal,
    pub paid_principal: Decimal,
    pub paid_interest: Decimal,
    pub paid_late_fee: Decimal,
    pub paid_date: Option<NaiveDate>,
    pub status_code: i32,
}

impl AccountPaymentRow {
    pub fn into_domain(self, currency: Currency) -> Result<AccountPayment, DatabaseError> {
        let money = |d: Decimal| Money::new(d, currency);
        Ok(AccountPayment {
            id: AccountPaymentId::from_uuid(self.id),
            account_id: AccountId::from_uuid(self.account_id),
            due_date: self.due_date,
            due_amount: money(self.due_amount),
            principal_amount: money(self.principal_amount),
            interest_amount: money(self.interest_amount),
            late_fee_amount: money(self.late_fee_amount),
            paid_amount: money(self.paid_amount),
            paid_principal: money(self.paid_principal),
            paid_interest: money(self.paid_interest),
            paid_late_fee: money(self.paid_late_fee),
            paid_date: self.paid_date,
            status: PaymentStatus::from_code(self.status_code).ok_or_else(|| {
                DatabaseError::invalid_value("account_payments.status_code", self.status_code)
            })?,
        })
    }
}

/// Row in `payback_transactions`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaybackTransactionRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: Decimal,
    pub payback_service: String,
    pub transaction_id: Option<String>,
    pub is_processed: bool,
    pub transaction_date: DateTime<Utc>,
}

impl PaybackTransactionRow {
    pub fn into_domain(self, currency: Currency) -> PaybackTransaction {
        PaybackTransaction {
            id: PaybackTransactionId::from_uuid(self.id),
            account_id: AccountId::from_uuid(self.account_id),
            amount: Money::new(self.amount, currency),
            payback_service: self.payback_service,
            transaction_id: self.transaction_id,
            is_processed: self.is_processed,
            transaction_date: self.transaction_date,
        }
    }
}

/// Row in `account_transactions`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountTransactionRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub payback_transaction_id: Option<Uuid>,
    pub transaction_type: String,
    pub transaction_amount: Decimal,
    pub towards_principal: Decimal,
    pub towards_interest: Decimal,
    pub towards_latefee: Decimal,
    pub transaction_date: DateTime<Utc>,
    pub accounting_date: NaiveDate,
    pub reversed_transaction_origin_id: Option<Uuid>,
    pub note: Option<String>,
}

impl AccountTransactionRow {
    pub fn into_domain(self, currency: Currency) -> Result<AccountTransaction, DatabaseError> {
        let money = |d: Decimal| Money::new(d, currency);
        Ok(AccountTransaction {
            id: AccountTransactionId::from_uuid(self.id),
            account_id: AccountId::from_uuid(self.account_id),
            payback_transaction_id: self
                .payback_transaction_id
                .map(PaybackTransactionId::from_uuid),
            transaction_type: self.transaction_type.parse().map_err(|_| {
                DatabaseError::invalid_value(
                    "account_transactions.transaction_type",
                    &self.transaction_type,
                )
            })?,
            transaction_amount: money(self.transaction_amount),
            towards_principal: money(self.towards_principal),
            towards_interest: money(self.towards_interest),
            towards_latefee: money(self.towards_latefee),
            transaction_date: self.transaction_date,
            accounting_date: self.accounting_date,
            reversed_transaction_origin_id: self
                .reversed_transaction_origin_id
                .map(AccountTransactionId::from_uuid),
            note: self.note,
        })
    }
}

/// Row in `payment_events`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentEventRow {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub account_transaction_id: Uuid,
    pub event_type: String,
    pub event_payment: Decimal,
    pub event_due_amount: Decimal,
    pub event_date: NaiveDate,
    pub reversed_event_id: Option<Uuid>,
    pub towards_principal: Decimal,
    pub towards_interest: Decimal,
    pub towards_latefee: Decimal,
}

impl PaymentEventRow {
    pub fn into_domain(self, currency: Currency) -> Result<PaymentEvent, DatabaseError> {
        let money = |d: Decimal| Money::new(d, currency);
        Ok(PaymentEvent {
            id: PaymentEventId::from_uuid(self.id),
            payment_id: PaymentId::from_uuid(self.payment_id),
            account_transaction_id: AccountTransactionId::from_uuid(self.account_transaction_id),
            event_type: self.event_type.parse().map_err(|_| {
                DatabaseError::invalid_value("payment_events.event_type", &self.event_type)
            })?,
            event_payment: money(self.event_payment),
            event_due_amount: money(self.event_due_amount),
            event_date: self.event_date,
            reversed_event_id: self.reversed_event_id.map(PaymentEventId::from_uuid),
            components: ComponentBreakdown {
                principal: money(self.towards_principal),
                interest: money(self.towards_interest),
                late_fee: money(self.towards_latefee),
            },
        })
    }
}

/// Row in `ptps`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PtpRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub account_payment_id: Uuid,
    pub account_transaction_id: Option<Uuid>,
    pub ptp_status: Option<String>,
    pub ptp_date: NaiveDate,
    pub ptp_amount: Decimal,
    pub paid_amount: Decimal,
}

impl PtpRow {
    pub fn into_domain(self, currency: Currency) -> Result<Ptp, DatabaseError> {
        let ptp_status = match self.ptp_status.as_deref() {
            Some(s) => Some(
                s.parse()
                    .map_err(|_| DatabaseError::invalid_value("ptps.ptp_status", s))?,
            ),
            None => None,
        };
        Ok(Ptp {
            id: PtpId::from_uuid(self.id),
            account_id: AccountId::from_uuid(self.account_id),
            account_payment_id: AccountPaymentId::from_uuid(self.account_payment_id),
            account_transaction_id: self
                .account_transaction_id
                .map(AccountTransactionId::from_uuid),
            ptp_status,
            ptp_date: self.ptp_date,
            ptp_amount: Money::new(self.ptp_amount, currency),
            paid_amount: Money::new(self.paid_amount, currency),
        })
    }
}

const PAYMENT_COLUMNS: &str = "id, loan_id, account_payment_id, payment_number, due_date, due_amount, \
     installment_principal, installment_interest, late_fee_amount, paid_amount, paid_principal, \
     paid_interest, paid_late_fee, paid_date, status_code";

const ACCOUNT_PAYMENT_COLUMNS: &str = "id, account_id, due_date, due_amount, principal_amount, \
     interest_amount, late_fee_amount, paid_amount, paid_principal, paid_interest, paid_late_fee, \
     paid_date, status_code";

const ACCOUNT_TRANSACTION_COLUMNS: &str = "id, account_id, payback_transaction_id, transaction_type, \
     transaction_amount, towards_principal, towards_interest, towards_latefee, transaction_date, \
     accounting_date, reversed_transaction_origin_id, note";

const PAYMENT_EVENT_COLUMNS: &str = "id, payment_id, account_transaction_id, event_type, event_payment, \
     event_due_amount, event_date, reversed_event_id, towards_principal, towards_interest, towards_latefee";

const PTP_COLUMNS: &str = "id, account_id, account_payment_id, account_transaction_id, ptp_status, \
     ptp_date, ptp_amount, paid_amount";

fn uuids<T>(ids: &[T], f: impl Fn(&T) -> Uuid) -> Vec<Uuid> {
    ids.iter().map(f).collect()
}

/// Queries over the repayment ledger tables
pub struct RepaymentRepository;

impl RepaymentRepository {
    /// Selects the account row with `FOR UPDATE`
    pub async fn lock_account(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<AccountRow>, sqlx::Error> {
        sqlx::query_as::<_, AccountRow>(
            "SELECT id, customer_id, status_code FROM accounts WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn get_account_transaction(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<AccountTransactionRow>, sqlx::Error> {
        sqlx::query_as::<_, AccountTransactionRow>(&format!(
            "SELECT {} FROM account_transactions WHERE id = $1",
            ACCOUNT_TRANSACTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn find_reversal_of(
        conn: &mut PgConnection,
        origin_id: Uuid,
    ) -> Result<Option<AccountTransactionRow>, sqlx::Error> {
        sqlx::query_as::<_, AccountTransactionRow>(&format!(
            "SELECT {} FROM account_transactions WHERE reversed_transaction_origin_id = $1 \
             ORDER BY created_at DESC LIMIT 1",
            ACCOUNT_TRANSACTION_COLUMNS
        ))
        .bind(origin_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn find_payment_events_for_transaction(
        conn: &mut PgConnection,
        account_transaction_id: Uuid,
    ) -> Result<Vec<PaymentEventRow>, sqlx::Error> {
        sqlx::query_as::<_, PaymentEventRow>(&format!(
            "SELECT {} FROM payment_events WHERE account_transaction_id = $1 ORDER BY created_at, id",
            PAYMENT_EVENT_COLUMNS
        ))
        .bind(account_transaction_id)
        .fetch_all(conn)
        .await
    }

    pub async fn get_payback_transaction(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<PaybackTransactionRow>, sqlx::Error> {
        sqlx::query_as::<_, PaybackTransactionRow>(
            "SELECT id, account_id, amount, payback_service, transaction_id, is_processed, \
             transaction_date FROM payback_transactions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    pub async fn get_payments(
        conn: &mut PgConnection,
        ids: &[PaymentId],
    ) -> Result<Vec<PaymentRow>, sqlx::Error> {
        sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = ANY($1) ORDER BY due_date, id",
            PAYMENT_COLUMNS
        ))
        .bind(uuids(ids, |id| *id.as_uuid()))
        .fetch_all(conn)
        .await
    }

    pub async fn find_payments_for_account_payments(
        conn: &mut PgConnection,
        ids: &[AccountPaymentId],
    ) -> Result<Vec<PaymentRow>, sqlx::Error> {
        sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE account_payment_id = ANY($1) ORDER BY due_date, id",
            PAYMENT_COLUMNS
        ))
        .bind(uuids(ids, |id| *id.as_uuid()))
        .fetch_all(conn)
        .await
    }

    pub async fn find_payments_for_loans(
        conn: &mut PgConnection,
        ids: &[LoanId],
    ) -> Result<Vec<PaymentRow>, sqlx::Error> {
        sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE loan_id = ANY($1) ORDER BY due_date, id",
            PAYMENT_COLUMNS
        ))
        .bind(uuids(ids, |id| *id.as_uuid()))
        .fetch_all(conn)
        .await
    }

    pub async fn get_account_payments(
        conn: &mut PgConnection,
        ids: &[AccountPaymentId],
    ) -> Result<Vec<AccountPaymentRow>, sqlx::Error> {
        sqlx::query_as::<_, AccountPaymentRow>(&format!(
            "SELECT {} FROM account_payments WHERE id = ANY($1) ORDER BY due_date, id",
            ACCOUNT_PAYMENT_COLUMNS
        ))
        .bind(uuids(ids, |id| *id.as_uuid()))
        .fetch_all(conn)
        .await
    }

    pub async fn find_unpaid_account_payments(
        conn: &mut PgConnection,
        account_id: Uuid,
    ) -> Result<Vec<AccountPaymentRow>, sqlx::Error> {
        sqlx::query_as::<_, AccountPaymentRow>(&format!(
            "SELECT {} FROM account_payments WHERE account_id = $1 AND due_amount > 0 \
             ORDER BY due_date, id",
            ACCOUNT_PAYMENT_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(conn)
        .await
    }

    pub async fn get_loans(
        conn: &mut PgConnection,
        ids: &[LoanId],
    ) -> Result<Vec<LoanRow>, sqlx::Error> {
        sqlx::query_as::<_, LoanRow>(
            "SELECT id, account_id, loan_amount, status_code FROM loans WHERE id = ANY($1) ORDER BY id",
        )
        .bind(uuids(ids, |id| *id.as_uuid()))
        .fetch_all(conn)
        .await
    }

    pub async fn find_loans_for_account(
        conn: &mut PgConnection,
        account_id: Uuid,
    ) -> Result<Vec<LoanRow>, sqlx::Error> {
        sqlx::query_as::<_, LoanRow>(
            "SELECT id, account_id, loan_amount, status_code FROM loans WHERE account_id = $1 ORDER BY id",
        )
        .bind(account_id)
        .fetch_all(conn)
        .await
    }

    pub async fn get_account_property(
        conn: &mut PgConnection,
        account_id: Uuid,
    ) -> Result<Option<AccountPropertyRow>, sqlx::Error> {
        sqlx::query_as::<_, AccountPropertyRow>(
            "SELECT account_id, is_proven, concurrency FROM account_properties WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn find_ptps_for_transaction(
        conn: &mut PgConnection,
        account_transaction_id: Uuid,
    ) -> Result<Vec<PtpRow>, sqlx::Error> {
        sqlx::query_as::<_, PtpRow>(&format!(
            "SELECT {} FROM ptps WHERE account_transaction_id = $1 \
             ORDER BY created_at DESC, id DESC",
            PTP_COLUMNS
        ))
        .bind(account_transaction_id)
        .fetch_all(conn)
        .await
    }

    pub async fn find_latest_ptp_for_account_payment(
        conn: &mut PgConnection,
        account_payment_id: Uuid,
    ) -> Result<Option<PtpRow>, sqlx::Error> {
        sqlx::query_as::<_, PtpRow>(&format!(
            "SELECT {} FROM ptps WHERE account_payment_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT 1",
            PTP_COLUMNS
        ))
        .bind(account_payment_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn insert_account_transaction(
        conn: &mut PgConnection,
        trx: &AccountTransaction,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO account_transactions (
                id, account_id, payback_transaction_id, transaction_type,
                transaction_amount, towards_principal, towards_interest, towards_latefee,
                transaction_date, accounting_date, reversed_transaction_origin_id, note
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(*trx.id.as_uuid())
        .bind(*trx.account_id.as_uuid())
        .bind(trx.payback_transaction_id.map(|id| *id.as_uuid()))
        .bind(trx.transaction_type.as_str())
        .bind(trx.transaction_amount.amount())
        .bind(trx.towards_principal.amount())
        .bind(trx.towards_interest.amount())
        .bind(trx.towards_latefee.amount())
        .bind(trx.transaction_date)
        .bind(trx.accounting_date)
        .bind(trx.reversed_transaction_origin_id.map(|id| *id.as_uuid()))
        .bind(trx.note.as_deref())
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn insert_payback_transaction(
        conn: &mut PgConnection,
        payback: &PaybackTransaction,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO payback_transactions (
                id, account_id, amount, payback_service, transaction_id, is_processed, transaction_date
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*payback.id.as_uuid())
        .bind(*payback.account_id.as_uuid())
        .bind(payback.amount.amount())
        .bind(payback.payback_service.as_str())
        .bind(payback.transaction_id.as_deref())
        .bind(payback.is_processed)
        .bind(payback.transaction_date)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn update_payback_transaction(
        conn: &mut PgConnection,
        payback: &PaybackTransaction,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE payback_transactions SET is_processed = $2 WHERE id = $1")
            .bind(*payback.id.as_uuid())
            .bind(payback.is_processed)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn insert_payment_event(
        conn: &mut PgConnection,
        event: &PaymentEvent,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO payment_events (
                id, payment_id, account_transaction_id, event_type, event_payment,
                event_due_amount, event_date, reversed_event_id,
                towards_principal, towards_interest, towards_latefee
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(*event.id.as_uuid())
        .bind(*event.payment_id.as_uuid())
        .bind(*event.account_transaction_id.as_uuid())
        .bind(event.event_type.as_str())
        .bind(event.event_payment.amount())
        .bind(event.event_due_amount.amount())
        .bind(event.event_date)
        .bind(event.reversed_event_id.map(|id| *id.as_uuid()))
        .bind(event.components.principal.amount())
        .bind(event.components.interest.amount())
        .bind(event.components.late_fee.amount())
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn update_payment(
        conn: &mut PgConnection,
        payment: &Payment,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE payments SET
                due_amount = $2, late_fee_amount = $3, paid_amount = $4,
                paid_principal = $5, paid_interest = $6, paid_late_fee = $7,
                paid_date = $8, status_code = $9
            WHERE id = $1
            "#,
        )
        .bind(*payment.id.as_uuid())
        .bind(payment.due_amount.amount())
        .bind(payment.late_fee_amount.amount())
        .bind(payment.paid_amount.amount())
        .bind(payment.paid_principal.amount())
        .bind(payment.paid_interest.amount())
        .bind(payment.paid_late_fee.amount())
        .bind(payment.paid_date)
        .bind(payment.status.code())
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn update_account_payment(
        conn: &mut PgConnection,
        account_payment: &AccountPayment,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE account_payments SET
                due_amount = $2, principal_amount = $3, interest_amount = $4,
                late_fee_amount = $5, paid_amount = $6, paid_principal = $7,
                paid_interest = $8, paid_late_fee = $9, paid_date = $10, status_code = $11
            WHERE id = $1
            "#,
        )
        .bind(*account_payment.id.as_uuid())
        .bind(account_payment.due_amount.amount())
        .bind(account_payment.principal_amount.amount())
        .bind(account_payment.interest_amount.amount())
        .bind(account_payment.late_fee_amount.amount())
        .bind(account_payment.paid_amount.amount())
        .bind(account_payment.paid_principal.amount())
        .bind(account_payment.paid_interest.amount())
        .bind(account_payment.paid_late_fee.amount())
        .bind(account_payment.paid_date)
        .bind(account_payment.status.code())
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn update_loan(conn: &mut PgConnection, loan: &Loan) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE loans SET status_code = $2 WHERE id = $1")
            .bind(*loan.id.as_uuid())
            .bind(loan.status.code())
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn upsert_account_property(
        conn: &mut PgConnection,
        property: &AccountProperty,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO account_properties (account_id, is_proven, concurrency)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id) DO UPDATE
                SET is_proven = EXCLUDED.is_proven, concurrency = EXCLUDED.concurrency
            "#,
        )
        .bind(*property.account_id.as_uuid())
        .bind(property.is_proven)
        .bind(property.concurrency)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn update_ptp(conn: &mut PgConnection, ptp: &Ptp) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE ptps SET
                account_transaction_id = $2, ptp_status = $3, paid_amount = $4
            WHERE id = $1
            "#,
        )
        .bind(*ptp.id.as_uuid())
        .bind(ptp.account_transaction_id.map(|id| *id.as_uuid()))
        .bind(ptp.ptp_status.map(|s| s.as_str()))
        .bind(ptp.paid_amount.amount())
        .execute(conn)
        .await?;
        Ok(())
    }
}
