use crate::domain::account::{Account, AccountId, User, UserId};
use crate::domain::ports::{Cache, ClockRef, LedgerCommit, LedgerStore, PostingQuery};
use crate::domain::transaction::Transaction;
use crate::error::{LedgerError, Result};
use crate::infrastructure::clock::SystemClock;
use async_trait::async_trait;
use cached::Cached;
use cached::stores::{CanExpire, ExpiringValueCache};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct LedgerState {
    users: HashMap<UserId, User>,
    user_emails: HashMap<String, UserId>,
    accounts: HashMap<AccountId, Account>,
    account_numbers: HashMap<String, AccountId>,
    /// Append order.
    postings: Vec<Transaction>,
    /// Positions in `postings` touching each account, ascending.
    account_postings: HashMap<AccountId, Vec<usize>>,
}

impl LedgerState {
    fn check_email(&self, email: &str) -> Result<()> {
        if self.user_emails.contains_key(email) {
            return Err(LedgerError::Conflict(format!(
                "email {email} already registered"
            )));
        }
        Ok(())
    }

    fn check_account_number(&self, number: &str) -> Result<()> {
        if self.account_numbers.contains_key(number) {
            return Err(LedgerError::Conflict(format!(
                "account number {number} already exists"
            )));
        }
        Ok(())
    }

    fn put_user(&mut self, user: User) {
        self.user_emails.insert(user.email.clone(), user.id);
        self.users.insert(user.id, user);
    }

    fn put_account(&mut self, account: Account) {
        self.account_numbers
            .insert(account.account_number.clone(), account.id);
        self.accounts.insert(account.id, account);
    }

    fn push_posting(&mut self, posting: Transaction) {
        let position = self.postings.len();
        self.account_postings
            .entry(posting.from_account_id)
            .or_default()
            .push(position);
        if posting.to_account_id != posting.from_account_id {
            self.account_postings
                .entry(posting.to_account_id)
                .or_default()
                .push(position);
        }
        self.postings.push(posting);
    }

    /// Postings a query can match, in insert order.
    fn candidates(&self, query: &PostingQuery) -> Vec<&Transaction> {
        match query.account_id {
            Some(account_id) => self
                .account_postings
                .get(&account_id)
                .map(|positions| positions.iter().map(|&i| &self.postings[i]).collect())
                .unwrap_or_default(),
            None => self.postings.iter().collect(),
        }
    }
}

/// A thread-safe in-memory ledger.
///
/// Uses a single `Arc<RwLock<..>>` over all tables so that a commit is one
/// write-locked critical section: either every change lands or none does.
/// Unique indexes on email and account number play the role of database
/// constraints.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_user(&self, user: User) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_email(&user.email)?;
        state.put_user(user);
        Ok(())
    }

    async fn user(&self, user_id: UserId) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&user_id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .user_emails
            .get(email)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn insert_account(&self, account: Account) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_account_number(&account.account_number)?;
        state.put_account(account);
        Ok(())
    }

    async fn account(&self, account_id: AccountId) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&account_id).cloned())
    }

    async fn account_by_number(&self, number: &str) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .account_numbers
            .get(number)
            .and_then(|id| state.accounts.get(id))
            .cloned())
    }

    async fn accounts_for_user(&self, user_id: UserId) -> Result<Vec<Account>> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    async fn system_accounts(&self) -> Result<Vec<Account>> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.is_system())
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        Ok(accounts)
    }

    async fn set_account_active(&self, account_id: AccountId, active: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;
        account.active = active;
        Ok(())
    }

    async fn commit(&self, unit: LedgerCommit) -> Result<()> {
        let mut state = self.state.write().await;

        // Validate every change before touching anything.
        if let Some(user) = &unit.created.user {
            state.check_email(&user.email)?;
        }
        for account in &unit.created.accounts {
            state.check_account_number(&account.account_number)?;
        }
        for change in &unit.balances {
            let balance = match unit.created.account(change.account_id) {
                Some(account) => account.balance,
                None => {
                    state
                        .accounts
                        .get(&change.account_id)
                        .ok_or_else(|| LedgerError::account_not_found(change.account_id))?
                        .balance
                }
            };
            if balance != change.expected {
                return Err(LedgerError::Conflict(format!(
                    "balance of account {} changed concurrently",
                    change.account_id
                )));
            }
        }

        if let Some(user) = unit.created.user {
            state.put_user(user);
        }
        for account in unit.created.accounts {
            state.put_account(account);
        }
        for change in &unit.balances {
            if let Some(account) = state.accounts.get_mut(&change.account_id) {
                account.balance = change.updated;
            }
        }
        state.push_posting(unit.posting);
        Ok(())
    }

    async fn postings(&self, query: &PostingQuery) -> Result<Vec<Transaction>> {
        let state = self.state.read().await;
        Ok(query.select(state.candidates(query)))
    }

    async fn count_postings(&self, query: &PostingQuery) -> Result<u64> {
        let state = self.state.read().await;
        Ok(query.count(state.candidates(query)))
    }
}

/// Sweep interval for expired cache entries, in seconds.
const CACHE_SWEEP_SECS: i64 = 60;
/// Entries held before the least recently used ones are evicted.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

struct CacheEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
    clock: ClockRef,
}

impl CanExpire for CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= self.clock.now())
    }
}

struct CacheState {
    entries: ExpiringValueCache<String, CacheEntry>,
    last_sweep: DateTime<Utc>,
}

/// In-process TTL cache on top of `cached`'s size-bounded LRU store.
///
/// Expiry follows the injected clock. Expired entries are dropped when read,
/// and swept from the whole store on the first write after `CACHE_SWEEP_SECS`,
/// so keys that are never read again do not pile up.
#[derive(Clone)]
pub struct InMemoryCache {
    state: Arc<Mutex<CacheState>>,
    clock: ClockRef,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: ClockRef) -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY, clock)
    }

    pub fn with_capacity(capacity: usize, clock: ClockRef) -> Self {
        let state = CacheState {
            entries: ExpiringValueCache::with_size(capacity.max(1)),
            last_sweep: clock.now(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            clock,
        }
    }

    /// Entries currently held, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().await;
        let value = state.entries.cache_get(key).map(|entry| entry.value.clone());
        if value.is_none() {
            state.entries.cache_remove(key);
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl));
        let entry = CacheEntry {
            value,
            expires_at,
            clock: self.clock.clone(),
        };

        let mut state = self.state.lock().await;
        if now - state.last_sweep >= TimeDelta::seconds(CACHE_SWEEP_SECS) {
            state.entries.flush();
            state.last_sweep = now;
        }
        state.entries.cache_set(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.entries.cache_remove(key);
        Ok(())
    }
}

/// A cache that never holds anything; every read is a miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}
