use super::account::AccountId;
use super::money::Balance;
use super::transaction::Transaction;
use crate::error::LedgerError;
use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One page of a longer, stable-ordered listing.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_number: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(u64::from(self.page_size))
    }
}

/// Inclusive statement window, interpreted in UTC.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct StatementPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl StatementPeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, LedgerError> {
        if start > end {
            return Err(LedgerError::ValidationError(format!(
                "Statement start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The default window: one calendar month back to `now`.
    pub fn last_month(now: DateTime<Utc>) -> Self {
        let start = now.checked_sub_months(Months::new(1)).unwrap_or(now);
        Self { start, end: now }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AccountStatement {
    pub account_id: AccountId,
    pub account_number: String,
    pub current_balance: Balance,
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
    pub total_payments: Decimal,
    pub transaction_count: usize,
    pub period: StatementPeriod,
    pub transactions: Vec<Transaction>,
}

impl AccountStatement {
    /// Folds completed postings of the window into the statement totals.
    pub fn build(
        account_id: AccountId,
        account_number: String,
        current_balance: Balance,
        period: StatementPeriod,
        transactions: Vec<Transaction>,
    ) -> Self {
        let mut total_deposits = Decimal::ZERO;
        let mut total_withdrawals = Decimal::ZERO;
        let mut total_payments = Decimal::ZERO;

        for tx in &transactions {
            let amount = tx.amount.value();
            if tx.to_account_id == account_id && tx.kind.is_deposit_like() {
                total_deposits += amount;
            }
            if tx.from_account_id == account_id {
                if tx.kind.is_withdrawal_like() {
                    total_withdrawals += amount;
                } else if tx.kind.is_payment_like() {
                    total_payments += amount;
                }
            }
        }

        Self {
            account_id,
            account_number,
            current_balance,
            total_deposits,
            total_withdrawals,
            total_payments,
            transaction_count: transactions.len(),
            period,
            transactions,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct BankStatistics {
    pub total_deposits: Decimal,
    pub total_withdrawals: Decimal,
    pub total_payments: Decimal,
    pub total_merchant_payments: Decimal,
    pub total_transfers: Decimal,
    pub total_transaction_count: usize,
    pub system_account_balances: BTreeMap<String, Balance>,
    pub generated_at: Option<DateTime<Utc>>,
}
