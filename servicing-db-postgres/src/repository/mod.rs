pub mod ach_repository_impl;
pub mod cash_repository_impl;
pub mod collections_repository_impl;
pub mod escrow_repository_impl;
pub mod executor;
pub mod ledger_repository_impl;
pub mod loan_repository_impl;
pub mod outbox_repository_impl;
pub mod payment_repository_impl;
pub mod product_repository_impl;
pub mod schedule_repository_impl;
pub mod unit_of_work_impl;
mod utils;

pub use ach_repository_impl::AchRepositoryImpl;
pub use cash_repository_impl::CashRepositoryImpl;
pub use collections_repository_impl::CollectionsRepositoryImpl;
pub use escrow_repository_impl::EscrowRepositoryImpl;
pub use executor::Executor;
pub use ledger_repository_impl::LedgerRepositoryImpl;
pub use loan_repository_impl::{AuditRepositoryImpl, LoanRepositoryImpl};
pub use outbox_repository_impl::OutboxRepositoryImpl;
pub use payment_repository_impl::PaymentRepositoryImpl;
pub use product_repository_impl::ProductRepositoryImpl;
pub use schedule_repository_impl::ScheduleRepositoryImpl;
pub use unit_of_work_impl::PostgresUnitOfWork;
