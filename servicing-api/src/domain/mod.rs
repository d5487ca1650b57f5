pub mod ach;
pub mod allocation;
pub mod cash;
pub mod collections;
pub mod daycount;
pub mod escrow;
pub mod ledger;
pub mod loan;
pub mod messaging;
pub mod money;
pub mod payment;
pub mod product;
pub mod schedule;

pub use ach::*;
pub use allocation::*;
pub use cash::*;
pub use collections::*;
pub use daycount::*;
pub use escrow::*;
pub use ledger::*;
pub use loan::*;
pub use messaging::*;
pub use money::*;
pub use payment::*;
pub use product::*;
pub use schedule::*;
