pub mod domain;
pub mod error;
pub mod service;

pub use domain::*;
pub use error::*;
pub use service::*;
