//! PostgreSQL Repayment Adapter
//!
//! This module provides the database adapter for the repayment domain,
//! implementing `RepaymentStore` and `RepaymentTx` on top of
//! `RepaymentRepository`.
//!
//! Each `PgRepaymentTx` owns one SQLx transaction. Accounts are locked with
//! `SELECT ... FOR UPDATE`, so two reversals for the same account serialize
//! on the row lock. Dropping the transaction rolls it back.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PgRepaymentStore;
//! use domain_repayment::{ReversalPolicy, ReversalService};
//! use std::sync::Arc;
//!
//! let store = Arc::new(PgRepaymentStore::new(pool));
//! let service = ReversalService::new(store, ReversalPolicy::default());
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{
    AccountId, AccountPaymentId, AccountTransactionId, AdapterHealth, Currency, DomainPort,
    HealthCheckResult, HealthCheckable, LoanId, PaybackTransactionId, PaymentId, PortError,
};
use domain_repayment::{
    Account, AccountPayment, AccountProperty, AccountTransaction, Loan, PaybackTransaction, Payment,
    PaymentEvent, Ptp, RepaymentStore, RepaymentTx,
};

use crate::error::{sql_to_port, DatabaseError};
use crate::repositories::repayment::RepaymentRepository;

const ADAPTER_ID: &str = "postgres-repayment-adapter";

/// PostgreSQL-backed implementation of [`RepaymentStore`]
///
/// Amounts are stored as bare NUMERIC columns; the adapter attaches
/// `currency` when mapping rows back to domain types.
#[derive(Debug, Clone)]
pub struct PgRepaymentStore {
    pool: PgPool,
    currency: Currency,
}

impl PgRepaymentStore {
    /// Creates a store for rupiah-denominated ledgers
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            currency: Currency::IDR,
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl DomainPort for PgRepaymentStore {}

#[async_trait]
impl HealthCheckable for PgRepaymentStore {
    /// Checks database connectivity
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl RepaymentStore for PgRepaymentStore {
    type Tx = PgRepaymentTx;

    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Self::Tx, PortError> {
        let tx = self.pool.begin().await.map_err(sql_to_port)?;
        debug!("Opened repayment transaction");
        Ok(PgRepaymentTx {
            tx,
            currency: self.currency,
        })
    }

    #[instrument(skip(self, tx))]
    async fn commit(&self, tx: Self::Tx) -> Result<(), PortError> {
        tx.tx
            .commit()
            .await
            .map_err(|e| PortError::from(DatabaseError::TransactionFailed(e.to_string())))?;
        debug!("Committed repayment transaction");
        Ok(())
    }
}

/// One open database transaction over the repayment tables
pub struct PgRepaymentTx {
    tx: Transaction<'static, Postgres>,
    currency: Currency,
}

impl std::fmt::Debug for PgRepaymentTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgRepaymentTx")
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

fn collect<R, T>(
    rows: Vec<R>,
    map: impl Fn(R) -> Result<T, DatabaseError>,
) -> Result<Vec<T>, PortError> {
    rows.into_iter()
        .map(|row| map(row).map_err(PortError::from))
        .collect()
}

#[async_trait]
impl RepaymentTx for PgRepaymentTx {
    #[instrument(skip(self), fields(account_id = %id))]
    async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, PortError> {
        let row = RepaymentRepository::lock_account(&mut self.tx, *id.as_uuid())
            .await
            .map_err(sql_to_port)?;
        debug!(found = row.is_some(), "Locked account row");
        row.map(|r| r.into_domain()).transpose().map_err(PortError::from)
    }

    async fn get_account_transaction(
        &mut self,
        id: AccountTransactionId,
    ) -> Result<Option<AccountTransaction>, PortError> {
        let row = RepaymentRepository::get_account_transaction(&mut self.tx, *id.as_uuid())
            .await
            .map_err(sql_to_port)?;
        row.map(|r| r.into_domain(self.currency))
            .transpose()
            .map_err(PortError::from)
    }

    async fn find_reversal_of(
        &mut self,
        origin: AccountTransactionId,
    ) -> Result<Option<AccountTransaction>, PortError> {
        let row = RepaymentRepository::find_reversal_of(&mut self.tx, *origin.as_uuid())
            .await
            .map_err(sql_to_port)?;
        row.map(|r| r.into_domain(self.currency))
            .transpose()
            .map_err(PortError::from)
    }

    async fn find_payment_events_for_transaction(
        &mut self,
        id: AccountTransactionId,
    ) -> Result<Vec<PaymentEvent>, PortError> {
        let rows =
            RepaymentRepository::find_payment_events_for_transaction(&mut self.tx, *id.as_uuid())
                .await
                .map_err(sql_to_port)?;
        let currency = self.currency;
        collect(rows, |r| r.into_domain(currency))
    }

    async fn get_payback_transaction(
        &mut self,
        id: PaybackTransactionId,
    ) -> Result<Option<PaybackTransaction>, PortError> {
        let row = RepaymentRepository::get_payback_transaction(&mut self.tx, *id.as_uuid())
            .await
            .map_err(sql_to_port)?;
        Ok(row.map(|r| r.into_domain(self.currency)))
    }

    async fn get_payments(&mut self, ids: &[PaymentId]) -> Result<Vec<Payment>, PortError> {
        let rows = RepaymentRepository::get_payments(&mut self.tx, ids)
            .await
            .map_err(sql_to_port)?;
        let currency = self.currency;
        collect(rows, |r| r.into_domain(currency))
    }

    async fn get_account_payments(
        &mut self,
        ids: &[AccountPaymentId],
    ) -> Result<Vec<AccountPayment>, PortError> {
        let rows = RepaymentRepository::get_account_payments(&mut self.tx, ids)
            .await
            .map_err(sql_to_port)?;
        let currency = self.currency;
        collect(rows, |r| r.into_domain(currency))
    }

    async fn find_unpaid_account_payments(
        &mut self,
        account_id: AccountId,
    ) -> Result<Vec<AccountPayment>, PortError> {
        let rows =
            RepaymentRepository::find_unpaid_account_payments(&mut self.tx, *account_id.as_uuid())
                .await
                .map_err(sql_to_port)?;
        let currency = self.currency;
        collect(rows, |r| r.into_domain(currency))
    }

    async fn find_payments_for_account_payments(
        &mut self,
        ids: &[AccountPaymentId],
    ) -> Result<Vec<Payment>, PortError> {
        let rows = RepaymentRepository::find_payments_for_account_payments(&mut self.tx, ids)
            .await
            .map_err(sql_to_port)?;
        let currency = self.currency;
        collect(rows, |r| r.into_domain(currency))
    }

    async fn get_loans(&mut self, ids: &[LoanId]) -> Result<Vec<Loan>, PortError> {
        let rows = RepaymentRepository::get_loans(&mut self.tx, ids)
            .await
            .map_err(sql_to_port)?;
        let currency = self.currency;
        collect(rows, |r| r.into_domain(currency))
    }

    async fn find_loans_for_account(
        &mut self,
        account_id: AccountId,
    ) -> Result<Vec<Loan>, PortError> {
        let rows = RepaymentRepository::find_loans_for_account(&mut self.tx, *account_id.as_uuid())
            .await
            .map_err(sql_to_port)?;
        let currency = self.currency;
        collect(rows, |r| r.into_domain(currency))
    }

    async fn find_payments_for_loans(&mut self, ids: &[LoanId]) -> Result<Vec<Payment>, PortError> {
        let rows = RepaymentRepository::find_payments_for_loans(&mut self.tx, ids)
            .await
            .map_err(sql_to_port)?;
        let currency = self.currency;
        collect(rows, |r| r.into_domain(currency))
    }

    async fn get_account_property(
        &mut self,
        account_id: AccountId,
    ) -> Result<Option<AccountProperty>, PortError> {
        let row = RepaymentRepository::get_account_property(&mut self.tx, *account_id.as_uuid())
            .await
            .map_err(sql_to_port)?;
        Ok(row.map(AccountProperty::from))
    }

    async fn find_ptps_for_transaction(
        &mut self,
        id: AccountTransactionId,
    ) -> Result<Vec<Ptp>, PortError> {
        let rows = RepaymentRepository::find_ptps_for_transaction(&mut self.tx, *id.as_uuid())
            .await
            .map_err(sql_to_port)?;
        rows.into_iter()
            .map(|r| r.into_domain(self.currency))
            .collect::<Result<Vec<_>, _>>()
            .map_err(PortError::from)
    }

    async fn find_latest_ptp_for_account_payment(
        &mut self,
        id: AccountPaymentId,
    ) -> Result<Option<Ptp>, PortError> {
        let row =
            RepaymentRepository::find_latest_ptp_for_account_payment(&mut self.tx, *id.as_uuid())
                .await
                .map_err(sql_to_port)?;
        row.map(|r| r.into_domain(self.currency))
            .transpose()
            .map_err(PortError::from)
    }

    #[instrument(
        skip(self, trx),
        fields(account_transaction_id = %trx.id, transaction_type = %trx.transaction_type)
    )]
    async fn insert_account_transaction(
        &mut self,
        trx: &AccountTransaction,
    ) -> Result<(), PortError> {
        RepaymentRepository::insert_account_transaction(&mut self.tx, trx)
            .await
            .map_err(sql_to_port)
    }

    async fn insert_payback_transaction(
        &mut self,
        payback: &PaybackTransaction,
    ) -> Result<(), PortError> {
        RepaymentRepository::insert_payback_transaction(&mut self.tx, payback)
            .await
            .map_err(sql_to_port)
    }

    async fn save_payback_transaction(
        &mut self,
        payback: &PaybackTransaction,
    ) -> Result<(), PortError> {
        RepaymentRepository::update_payback_transaction(&mut self.tx, payback)
            .await
            .map_err(sql_to_port)
    }

    async fn insert_payment_event(&mut self, event: &PaymentEvent) -> Result<(), PortError> {
        RepaymentRepository::insert_payment_event(&mut self.tx, event)
            .await
            .map_err(sql_to_port)
    }

    async fn save_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        RepaymentRepository::update_payment(&mut self.tx, payment)
            .await
            .map_err(sql_to_port)
    }

    async fn save_account_payment(
        &mut self,
        account_payment: &AccountPayment,
    ) -> Result<(), PortError> {
        RepaymentRepository::update_account_payment(&mut self.tx, account_payment)
            .await
            .map_err(sql_to_port)
    }

    async fn save_loan(&mut self, loan: &Loan) -> Result<(), PortError> {
        RepaymentRepository::update_loan(&mut self.tx, loan)
            .await
            .map_err(sql_to_port)
    }

    async fn save_account_property(&mut self, property: &AccountProperty) -> Result<(), PortError> {
        RepaymentRepository::upsert_account_property(&mut self.tx, property)
            .await
            .map_err(sql_to_port)
    }

    async fn save_ptp(&mut self, ptp: &Ptp) -> Result<(), PortError> {
        RepaymentRepository::update_ptp(&mut self.tx, ptp)
            .await
            .map_err(sql_to_port)
    }
}
