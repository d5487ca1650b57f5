pub mod ach_repository;
pub mod cash_repository;
pub mod collections_repository;
pub mod escrow_repository;
pub mod ledger_repository;
pub mod loan_repository;
pub mod outbox_repository;
pub mod payment_repository;
pub mod product_repository;
pub mod schedule_repository;
pub mod unit_of_work;

pub use ach_repository::*;
pub use cash_repository::*;
pub use collections_repository::*;
pub use escrow_repository::*;
pub use ledger_repository::*;
pub use loan_repository::*;
pub use outbox_repository::*;
pub use payment_repository::*;
pub use product_repository::*;
pub use schedule_repository::*;
pub use unit_of_work::*;
