pub mod ach_service_impl;
pub mod collections_service_impl;
pub mod escrow_service_impl;
pub mod ledger_service_impl;
pub mod payment_service_impl;
pub mod policy_service;
pub mod reconciliation_service_impl;
pub mod schedule_service_impl;
pub mod servicing_cycle_impl;

pub use ach_service_impl::AchServiceImpl;
pub use collections_service_impl::CollectionsServiceImpl;
pub use escrow_service_impl::EscrowServiceImpl;
pub use ledger_service_impl::LedgerServiceImpl;
pub use payment_service_impl::PaymentServiceImpl;
pub use policy_service::PolicyService;
pub use reconciliation_service_impl::ReconciliationServiceImpl;
pub use schedule_service_impl::ScheduleServiceImpl;
pub use servicing_cycle_impl::ServicingCycleImpl;
