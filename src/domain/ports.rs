use super::account::{Account, AccountId, User, UserId};
use super::money::Balance;
use super::transaction::{Transaction, TransactionKind, TransactionStatus};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

/// A balance mutation bound to the balance the engine observed.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceChange {
    pub account_id: AccountId,
    pub expected: Balance,
    pub updated: Balance,
}

/// Records first created by a commit, inserted together with its posting.
///
/// System accounts (and the system user owning them) come into existence on
/// their first posting, so a rejected posting never leaves them behind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRecords {
    pub user: Option<User>,
    pub accounts: Vec<Account>,
}

impl NewRecords {
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.accounts.is_empty()
    }

    pub fn account(&self, account_id: AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == account_id)
    }
}

/// Everything one money movement writes, applied all-or-nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerCommit {
    pub posting: Transaction,
    pub balances: Vec<BalanceChange>,
    pub created: NewRecords,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountSide {
    Source,
    Destination,
    #[default]
    Either,
}

/// Filter over postings. Bounds on `created_at` are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingQuery {
    pub account_id: Option<AccountId>,
    pub side: AccountSide,
    pub kinds: Option<Vec<TransactionKind>>,
    pub status: Option<TransactionStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl PostingQuery {
    pub fn for_account(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(account_id) = self.account_id {
            let hit = match self.side {
                AccountSide::Source => tx.from_account_id == account_id,
                AccountSide::Destination => tx.to_account_id == account_id,
                AccountSide::Either => tx.touches(account_id),
            };
            if !hit {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds
            && !kinds.contains(&tx.kind)
        {
            return false;
        }
        if let Some(status) = self.status
            && tx.status != status
        {
            return false;
        }
        if let Some(since) = self.since
            && tx.created_at < since
        {
            return false;
        }
        if let Some(until) = self.until
            && tx.created_at > until
        {
            return false;
        }
        true
    }

    /// Applies the filter, ordering and paging to postings given in insert order.
    pub fn select<'a, I>(&self, postings: I) -> Vec<Transaction>
    where
        I: IntoIterator<Item = &'a Transaction>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut matching: Vec<&Transaction> = postings
            .into_iter()
            .rev()
            .filter(|tx| self.matches(tx))
            .collect();
        // Stable: equal timestamps keep the later insert first.
        matching.sort_by_key(|tx| Reverse(tx.created_at));
        matching
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Number of matching postings, ignoring `offset` and `limit`.
    pub fn count<'a>(&self, postings: impl IntoIterator<Item = &'a Transaction>) -> u64 {
        postings.into_iter().filter(|tx| self.matches(tx)).count() as u64
    }
}

/// The authoritative ledger: users, accounts and postings.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fails with `Conflict` if the email is already registered.
    async fn insert_user(&self, user: User) -> Result<()>;
    async fn user(&self, user_id: UserId) -> Result<Option<User>>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Fails with `Conflict` if the account number is taken.
    async fn insert_account(&self, account: Account) -> Result<()>;
    async fn account(&self, account_id: AccountId) -> Result<Option<Account>>;
    async fn account_by_number(&self, number: &str) -> Result<Option<Account>>;
    async fn accounts_for_user(&self, user_id: UserId) -> Result<Vec<Account>>;
    async fn system_accounts(&self) -> Result<Vec<Account>>;
    async fn set_account_active(&self, account_id: AccountId, active: bool) -> Result<()>;

    /// Inserts `created`, then applies the posting and every balance change,
    /// all atomically.
    ///
    /// Fails with `Conflict`, writing nothing, when a created email or account
    /// number is already taken, or when any account's balance no longer equals
    /// `expected`.
    async fn commit(&self, unit: LedgerCommit) -> Result<()>;

    /// Matching postings, most recent first; ties keep the later insert first.
    async fn postings(&self, query: &PostingQuery) -> Result<Vec<Transaction>>;
    /// Number of matching postings, ignoring `offset` and `limit`.
    async fn count_postings(&self, query: &PostingQuery) -> Result<u64>;
}

/// Best-effort string cache with per-entry expiry. Never authoritative.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Source of "now" for business rules.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type CacheRef = Arc<dyn Cache>;
pub type ClockRef = Arc<dyn Clock>;
