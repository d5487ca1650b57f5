use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

use servicing_api::{ServicingError, ServicingResult};
use servicing_db::repository::{
    AchRepository, AuditRepository, CashRepository, CollectionsRepository, EscrowRepository,
    LedgerRepository, LoanRepository, OutboxRepository, PaymentRepository, ScheduleRepository,
    UnitOfWork, UnitOfWorkSession,
};

use super::ach_repository_impl::AchRepositoryImpl;
use super::cash_repository_impl::CashRepositoryImpl;
use super::collections_repository_impl::CollectionsRepositoryImpl;
use super::escrow_repository_impl::EscrowRepositoryImpl;
use super::executor::Executor;
use super::ledger_repository_impl::LedgerRepositoryImpl;
use super::loan_repository_impl::{AuditRepositoryImpl, LoanRepositoryImpl};
use super::outbox_repository_impl::OutboxRepositoryImpl;
use super::payment_repository_impl::PaymentRepositoryImpl;
use super::schedule_repository_impl::ScheduleRepositoryImpl;

/// Postgres unit of work: one transaction shared by every repository the
/// session hands out.
pub struct PostgresUnitOfWork {
    pool: Arc<PgPool>,
}

impl PostgresUnitOfWork {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn begin(&self) -> ServicingResult<Box<dyn UnitOfWorkSession>> {
        let tx: Transaction<'static, Postgres> =
            self.pool.begin().await.map_err(ServicingError::from)?;
        Ok(Box::new(PostgresSession {
            tx: Arc::new(Mutex::new(tx)),
        }))
    }
}

pub struct PostgresSession {
    tx: Arc<Mutex<Transaction<'static, Postgres>>>,
}

impl PostgresSession {
    fn executor(&self) -> Executor {
        Executor::Tx(self.tx.clone())
    }

    fn take_tx(self) -> ServicingResult<Transaction<'static, Postgres>> {
        Arc::into_inner(self.tx)
            .map(|mutex| mutex.into_inner())
            .ok_or_else(|| {
                ServicingError::Internal(
                    "unit of work still referenced by a repository at commit".to_string(),
                )
            })
    }
}

#[async_trait]
impl UnitOfWorkSession for PostgresSession {
    fn ledger(&self) -> Arc<dyn LedgerRepository> {
        Arc::new(LedgerRepositoryImpl::new(self.executor()))
    }
    fn payments(&self) -> Arc<dyn PaymentRepository> {
        Arc::new(PaymentRepositoryImpl::new(self.executor()))
    }
    fn outbox(&self) -> Arc<dyn OutboxRepository> {
        Arc::new(OutboxRepositoryImpl::new(self.executor()))
    }
    fn schedules(&self) -> Arc<dyn ScheduleRepository> {
        Arc::new(ScheduleRepositoryImpl::new(self.executor()))
    }
    fn loans(&self) -> Arc<dyn LoanRepository> {
        Arc::new(LoanRepositoryImpl::new(self.executor()))
    }
    fn escrow(&self) -> Arc<dyn EscrowRepository> {
        Arc::new(EscrowRepositoryImpl::new(self.executor()))
    }
    fn collections(&self) -> Arc<dyn CollectionsRepository> {
        Arc::new(CollectionsRepositoryImpl::new(self.executor()))
    }
    fn cash(&self) -> Arc<dyn CashRepository> {
        Arc::new(CashRepositoryImpl::new(self.executor()))
    }
    fn ach(&self) -> Arc<dyn AchRepository> {
        Arc::new(AchRepositoryImpl::new(self.executor()))
    }
    fn audit(&self) -> Arc<dyn AuditRepository> {
        Arc::new(AuditRepositoryImpl::new(self.executor()))
    }

    async fn commit(self: Box<Self>) -> ServicingResult<()> {
        let tx = self.take_tx()?;
        tx.commit().await.map_err(ServicingError::from)
    }

    async fn rollback(self: Box<Self>) -> ServicingResult<()> {
        let tx = self.take_tx()?;
        tx.rollback().await.map_err(ServicingError::from)
    }
}
