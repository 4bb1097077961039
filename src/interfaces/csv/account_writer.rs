use crate::domain::account::Account;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// One output line of the accounts report.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct AccountRow {
    /// The reference the batch used for the account; the number for system accounts.
    pub account: String,
    pub number: String,
    pub currency: String,
    pub balance: String,
    pub active: bool,
}

impl AccountRow {
    pub fn new(reference: &str, account: &Account) -> Self {
        Self {
            account: reference.to_string(),
            number: account.account_number.clone(),
            currency: account.currency.to_string(),
            balance: account.balance.to_string(),
            active: account.active,
        }
    }
}

/// Writes account rows as CSV with a header line.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, rows: impl IntoIterator<Item = AccountRow>) -> Result<()> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
