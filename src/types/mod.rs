//! Type definitions for awscost

mod billing;
mod error;
mod response;

pub use billing::*;
pub use error::*;
pub use response::*;
