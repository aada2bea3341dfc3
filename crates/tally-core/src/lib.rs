//! tally-core
//!
//! Billing logic for Tally: turns unbilled tracked time into invoices.
//! Depends on tally-domain. No CLI, no terminal I/O, no SQL.

pub mod billing_service;
pub mod error;
pub mod numbering;
pub mod storage;
pub mod time;

pub use billing_service::*;
pub use error::{CoreError, CoreResult};
pub use numbering::*;
pub use storage::*;
pub use time::Clock;

#[cfg(test)]
mod tests;
