use std::sync::Arc;

use async_trait::async_trait;
use servicing_api::ServicingResult;

use crate::repository::{
    AchRepository, AuditRepository, CashRepository, CollectionsRepository, EscrowRepository,
    LedgerRepository, LoanRepository, OutboxRepository, PaymentRepository, ScheduleRepository,
};

/// Factory for transactional sessions. A stage consumer opens one
/// session per message so that its business rows, the ledger event, and
/// the outbox entry commit or roll back as a unit.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> ServicingResult<Box<dyn UnitOfWorkSession>>;
}

/// Repositories bound to one open transaction. Dropping the session
/// without `commit` rolls the transaction back.
#[async_trait]
pub trait UnitOfWorkSession: Send + Sync {
    fn ledger(&self) -> Arc<dyn LedgerRepository>;
    fn payments(&self) -> Arc<dyn PaymentRepository>;
    fn outbox(&self) -> Arc<dyn OutboxRepository>;
    fn schedules(&self) -> Arc<dyn ScheduleRepository>;
    fn loans(&self) -> Arc<dyn LoanRepository>;
    fn escrow(&self) -> Arc<dyn EscrowRepository>;
    fn collections(&self) -> Arc<dyn CollectionsRepository>;
    fn cash(&self) -> Arc<dyn CashRepository>;
    fn ach(&self) -> Arc<dyn AchRepository>;
    fn audit(&self) -> Arc<dyn AuditRepository>;

    async fn commit(self: Box<Self>) -> ServicingResult<()>;
    async fn rollback(self: Box<Self>) -> ServicingResult<()>;
}
