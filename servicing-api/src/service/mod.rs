pub mod ach_service;
pub mod collections_service;
pub mod escrow_service;
pub mod ledger_service;
pub mod broker;
pub mod payment_service;
pub mod reconciliation_service;
pub mod schedule_service;
pub mod servicing_cycle_service;

pub use ach_service::*;
pub use collections_service::*;
pub use escrow_service::*;
pub use ledger_service::*;
pub use broker::*;
pub use payment_service::*;
pub use reconciliation_service::*;
pub use schedule_service::*;
pub use servicing_cycle_service::*;
