use crate::error::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Business limits and cache tuning for the ledger services.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Ceiling on completed cash withdrawals per account per UTC day.
    pub daily_withdrawal_limit: Decimal,
    /// Largest single cash deposit.
    pub max_deposit_amount: Decimal,
    pub max_description_len: usize,
    pub max_page_size: u32,
    /// Lifetime of a cached history page.
    pub history_cache_ttl_secs: u64,
    /// Lifetime of an account's history generation marker.
    pub history_version_ttl_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            daily_withdrawal_limit: dec!(50000),
            max_deposit_amount: dec!(1000000),
            max_description_len: 200,
            max_page_size: 100,
            history_cache_ttl_secs: 300,
            history_version_ttl_secs: 3600,
        }
    }
}

impl LedgerConfig {
    /// Reads a JSON config file; missing fields fall back to the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn history_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.history_cache_ttl_secs)
    }

    pub fn history_version_ttl(&self) -> Duration {
        Duration::from_secs(self.history_version_ttl_secs)
    }
}
