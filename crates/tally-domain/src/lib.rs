//! tally-domain
//!
//! Pure domain models (Client, Company, Contract, TimeEntry, Invoice, etc.).
//! No I/O, no CLI, no storage. Only data types and core enums.

pub mod client;
pub mod common;
pub mod contract;
pub mod invoice;
pub mod time_entry;

pub use client::*;
pub use common::*;
pub use contract::*;
pub use invoice::*;
pub use time_entry::*;
