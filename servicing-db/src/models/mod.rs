pub mod ach;
pub mod cash;
pub mod collections;
pub mod escrow;
pub mod ledger;
pub mod loan;
pub mod payment;
pub mod schedule;

pub use ach::*;
pub use cash::*;
pub use collections::*;
pub use escrow::*;
pub use ledger::*;
pub use loan::*;
pub use payment::*;
pub use schedule::*;
