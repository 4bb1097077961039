#![allow(dead_code)]

use bankledger::application::Bank;
use bankledger::application::requests::{DepositRequest, OpenAccountRequest, RegisterUserRequest};
use bankledger::config::LedgerConfig;
use bankledger::domain::account::{Account, AccountKind, Currency, UserId};
use bankledger::domain::money::Amount;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use tempfile::NamedTempFile;

pub const HEADER: [&str; 11] = [
    "op",
    "user",
    "account",
    "target",
    "amount",
    "currency",
    "kind",
    "party",
    "reference",
    "category",
    "description",
];

/// Writes a batch file; short rows are padded by the reader.
pub fn write_batch(rows: &[&[&str]]) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(file.path())
        .unwrap();
    wtr.write_record(HEADER).unwrap();
    for row in rows {
        wtr.write_record(*row).unwrap();
    }
    wtr.flush().unwrap();
    file
}

/// One account per user alias, each funded with `deposit` repeated `rows` times.
pub fn generate_batch(path: &Path, users: usize, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);
    wtr.write_record(HEADER)?;

    for user in 1..=users {
        let user = user.to_string();
        let alias = format!("acc{user}");
        wtr.write_record(["open", user.as_str(), alias.as_str(), "", "", "USD"])?;
    }
    for i in 0..rows {
        let user = (i % users + 1).to_string();
        let alias = format!("acc{user}");
        wtr.write_record(["deposit", user.as_str(), alias.as_str(), "", "1.00"])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn amount(value: Decimal) -> Amount {
    Amount::new(value).unwrap()
}

pub fn bank() -> Bank {
    Bank::in_memory(LedgerConfig::default())
}

pub async fn customer(bank: &Bank, email: &str, currency: &str) -> (UserId, Account) {
    let user = bank
        .directory
        .register_user(RegisterUserRequest {
            email: email.to_string(),
            full_name: "Integration Customer".to_string(),
            phone_number: String::new(),
        })
        .await
        .unwrap();
    let account = bank
        .directory
        .open_account(
            user.id,
            OpenAccountRequest {
                kind: AccountKind::Checking,
                currency: Currency::new(currency).unwrap(),
            },
        )
        .await
        .unwrap();
    (user.id, account)
}

pub async fn deposit(bank: &Bank, user_id: UserId, account: &Account, value: Decimal) {
    bank.engine
        .deposit(
            user_id,
            DepositRequest {
                account_id: account.id,
                amount: amount(value),
                description: String::new(),
            },
        )
        .await
        .unwrap();
}
