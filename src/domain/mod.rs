//! Ledger domain: money, accounts, postings, report shapes and the ports the
//! application layer depends on.

pub mod account;
pub mod money;
pub mod ports;
pub mod report;
pub mod transaction;
