//! Application layer orchestrating the ledger use cases.
//!
//! `TransactionEngine` executes money movements, `ReportingEngine` serves the
//! read side, and `AccountDirectory` owns users and accounts. `Bank` wires them
//! over shared storage, cache, clock and per-account locks.

pub mod bank;
pub mod directory;
pub mod engine;
pub mod history;
pub mod locks;
pub mod reporting;
pub mod requests;

pub use bank::Bank;
pub use directory::AccountDirectory;
pub use engine::TransactionEngine;
pub use reporting::ReportingEngine;
