//! CSV batch surface: commands in, account balances out.

pub mod account_writer;
pub mod batch;
pub mod command_reader;
