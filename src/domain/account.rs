use super::money::{Amount, Balance};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix shared by every bank-owned counterparty account number.
pub const SYSTEM_ACCOUNT_PREFIX: &str = "SYSTEM_";
/// Email of the reserved user owning all system accounts.
pub const SYSTEM_USER_EMAIL: &str = "system@bank.internal";

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

uuid_id!(UserId);
uuid_id!(AccountId);

/// ISO-4217 style three-letter currency code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, LedgerError> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(LedgerError::ValidationError(format!(
                "Invalid currency code: {code:?}"
            )))
        }
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    #[default]
    Checking,
    Savings,
    Investment,
}

/// What a bank-owned counterparty account stands for.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum SystemPurpose {
    Deposits,
    Withdrawals,
    Payments,
    Merchants,
}

impl SystemPurpose {
    pub fn tag(&self) -> &'static str {
        match self {
            SystemPurpose::Deposits => "DEPOSITS",
            SystemPurpose::Withdrawals => "WITHDRAWALS",
            SystemPurpose::Payments => "PAYMENTS",
            SystemPurpose::Merchants => "MERCHANTS",
        }
    }

    /// `SYSTEM_<PURPOSE>_<CURRENCY>`
    pub fn account_number(&self, currency: &Currency) -> String {
        format!("{SYSTEM_ACCOUNT_PREFIX}{}_{}", self.tag(), currency)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

impl User {
    pub fn new(email: &str, full_name: &str, phone_number: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            email: email.trim().to_ascii_lowercase(),
            full_name: full_name.trim().to_string(),
            phone_number: phone_number.trim().to_string(),
            created_at: now,
            active: true,
        }
    }

    pub fn system(now: DateTime<Utc>) -> Self {
        Self::new(SYSTEM_USER_EMAIL, "System Account", "+00000000000", now)
    }
}

/// A money container owned by a user.
///
/// Only `balance` and `active` ever change after creation, and the balance
/// only through a ledger commit.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    pub account_number: String,
    pub balance: Balance,
    pub currency: Currency,
    pub kind: AccountKind,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn open(
        user_id: UserId,
        account_number: String,
        currency: Currency,
        kind: AccountKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            user_id,
            account_number,
            balance: Balance::ZERO,
            currency,
            kind,
            active: true,
            created_at: now,
        }
    }

    pub fn system(
        owner: UserId,
        purpose: SystemPurpose,
        currency: Currency,
        now: DateTime<Utc>,
    ) -> Self {
        let number = purpose.account_number(&currency);
        Self::open(owner, number, currency, AccountKind::Checking, now)
    }

    pub fn is_system(&self) -> bool {
        self.account_number.starts_with(SYSTEM_ACCOUNT_PREFIX)
    }

    /// User accounts may never go below zero; system accounts are pass-through.
    pub fn can_debit(&self, amount: Amount) -> bool {
        self.is_system() || self.balance.covers(amount)
    }
}

/// `ACC<yyyyMMdd><6 random digits>`
pub fn generate_account_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    format!("ACC{}{suffix}", now.format("%Y%m%d"))
}
