use crate::domain::account::{Account, AccountId, User, UserId};
use crate::domain::ports::{LedgerCommit, LedgerStore, PostingQuery};
use crate::domain::transaction::Transaction;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Column Family for user records, keyed by user id.
pub const CF_USERS: &str = "users";
/// Column Family mapping email -> user id (unique index).
pub const CF_USER_EMAILS: &str = "user_emails";
/// Column Family for account states, keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family mapping account number -> account id (unique index).
pub const CF_ACCOUNT_NUMBERS: &str = "account_numbers";
/// Column Family for postings, keyed by a big-endian insert sequence.
pub const CF_POSTINGS: &str = "postings";
/// Column Family indexing postings by account: `account id ++ sequence` -> empty.
pub const CF_ACCOUNT_POSTINGS: &str = "account_postings";

const COLUMN_FAMILIES: [&str; 6] = [
    CF_USERS,
    CF_USER_EMAILS,
    CF_ACCOUNTS,
    CF_ACCOUNT_NUMBERS,
    CF_POSTINGS,
    CF_ACCOUNT_POSTINGS,
];

/// A persistent ledger implementation using RocksDB.
///
/// Every multi-key write goes through one `WriteBatch`, so a commit lands
/// entirely or not at all. Writers are serialized by `write_lock`, which makes
/// the unique-index checks and the expected-balance check race-free within
/// the process.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
    next_sequence: Arc<AtomicU64>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every required column family exists and resumes the
    /// posting sequence after the last stored posting.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let next = {
            let cf = db.cf_handle(CF_POSTINGS).ok_or_else(|| missing_cf(CF_POSTINGS))?;
            match db.iterator_cf(cf, IteratorMode::End).next() {
                Some(item) => {
                    let (key, _) = item?;
                    decode_sequence(&key)? + 1
                }
                None => 0,
            }
        };

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
            next_sequence: Arc::new(AtomicU64::new(next)),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| missing_cf(name))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.put_cf(cf, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn key_exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        Ok(self.db.get_pinned_cf(cf, key)?.is_some())
    }

    fn check_email(&self, email: &str) -> Result<()> {
        if self.key_exists(CF_USER_EMAILS, email.as_bytes())? {
            return Err(LedgerError::Conflict(format!(
                "email {email} already registered"
            )));
        }
        Ok(())
    }

    fn check_account_number(&self, number: &str) -> Result<()> {
        if self.key_exists(CF_ACCOUNT_NUMBERS, number.as_bytes())? {
            return Err(LedgerError::Conflict(format!(
                "account number {number} already exists"
            )));
        }
        Ok(())
    }

    fn put_user(&self, batch: &mut WriteBatch, user: &User) -> Result<()> {
        let id = user.id.0.as_bytes();
        self.put_json(batch, CF_USERS, id, user)?;
        batch.put_cf(self.cf(CF_USER_EMAILS)?, user.email.as_bytes(), id);
        Ok(())
    }

    fn put_account(&self, batch: &mut WriteBatch, account: &Account) -> Result<()> {
        let id = account.id.0.as_bytes();
        self.put_json(batch, CF_ACCOUNTS, id, account)?;
        batch.put_cf(
            self.cf(CF_ACCOUNT_NUMBERS)?,
            account.account_number.as_bytes(),
            id,
        );
        Ok(())
    }

    /// Postings touching the account, in insert order, read through the index.
    fn account_postings(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let cf = self.cf(CF_ACCOUNT_POSTINGS)?;
        let prefix: &[u8] = account_id.0.as_bytes();
        let mut postings = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            let sequence = &key[prefix.len()..];
            let posting = self.get_json::<Transaction>(CF_POSTINGS, sequence)?.ok_or_else(|| {
                LedgerError::StorageError("posting index points at a missing posting".to_string())
            })?;
            postings.push(posting);
        }
        Ok(postings)
    }

    /// Postings a query can match, in insert order.
    fn candidates(&self, query: &PostingQuery) -> Result<Vec<Transaction>> {
        match query.account_id {
            Some(account_id) => self.account_postings(account_id),
            None => self.scan(CF_POSTINGS),
        }
    }
}

fn index_key(account_id: AccountId, sequence: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(account_id.0.as_bytes());
    key.extend_from_slice(&sequence.to_be_bytes());
    key
}

fn missing_cf(name: &str) -> LedgerError {
    LedgerError::StorageError(format!("{name} column family not found"))
}

fn decode_sequence(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| LedgerError::StorageError("malformed posting key".to_string()))?;
    Ok(u64::from_be_bytes(bytes))
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn insert_user(&self, user: User) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.check_email(&user.email)?;

        let mut batch = WriteBatch::default();
        self.put_user(&mut batch, &user)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn user(&self, user_id: UserId) -> Result<Option<User>> {
        self.get_json(CF_USERS, user_id.0.as_bytes())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let cf = self.cf(CF_USER_EMAILS)?;
        match self.db.get_cf(cf, email.as_bytes())? {
            Some(id) => self.get_json(CF_USERS, &id),
            None => Ok(None),
        }
    }

    async fn insert_account(&self, account: Account) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.check_account_number(&account.account_number)?;

        let mut batch = WriteBatch::default();
        self.put_account(&mut batch, &account)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn account(&self, account_id: AccountId) -> Result<Option<Account>> {
        self.get_json(CF_ACCOUNTS, account_id.0.as_bytes())
    }

    async fn account_by_number(&self, number: &str) -> Result<Option<Account>> {
        let cf = self.cf(CF_ACCOUNT_NUMBERS)?;
        match self.db.get_cf(cf, number.as_bytes())? {
            Some(id) => self.get_json(CF_ACCOUNTS, &id),
            None => Ok(None),
        }
    }

    async fn accounts_for_user(&self, user_id: UserId) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .scan::<Account>(CF_ACCOUNTS)?
            .into_iter()
            .filter(|a| a.user_id == user_id)
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    async fn system_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .scan::<Account>(CF_ACCOUNTS)?
            .into_iter()
            .filter(|a| a.is_system())
            .collect();
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        Ok(accounts)
    }

    async fn set_account_active(&self, account_id: AccountId, active: bool) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut account: Account = self
            .get_json(CF_ACCOUNTS, account_id.0.as_bytes())?
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;
        account.active = active;

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_ACCOUNTS, account_id.0.as_bytes(), &account)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn commit(&self, unit: LedgerCommit) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(user) = &unit.created.user {
            self.check_email(&user.email)?;
        }
        for account in &unit.created.accounts {
            self.check_account_number(&account.account_number)?;
        }
        let mut updated = Vec::with_capacity(unit.balances.len());
        for change in &unit.balances {
            let mut account = match unit.created.account(change.account_id) {
                Some(account) => account.clone(),
                None => self
                    .get_json::<Account>(CF_ACCOUNTS, change.account_id.0.as_bytes())?
                    .ok_or_else(|| LedgerError::account_not_found(change.account_id))?,
            };
            if account.balance != change.expected {
                return Err(LedgerError::Conflict(format!(
                    "balance of account {} changed concurrently",
                    change.account_id
                )));
            }
            account.balance = change.updated;
            updated.push(account);
        }

        // Later puts in a batch win, so updated balances overwrite new accounts.
        let mut batch = WriteBatch::default();
        if let Some(user) = &unit.created.user {
            self.put_user(&mut batch, user)?;
        }
        for account in &unit.created.accounts {
            self.put_account(&mut batch, account)?;
        }
        for account in &updated {
            self.put_json(&mut batch, CF_ACCOUNTS, account.id.0.as_bytes(), account)?;
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.put_json(&mut batch, CF_POSTINGS, &sequence.to_be_bytes(), &unit.posting)?;
        let index = self.cf(CF_ACCOUNT_POSTINGS)?;
        batch.put_cf(index, index_key(unit.posting.from_account_id, sequence), b"");
        batch.put_cf(index, index_key(unit.posting.to_account_id, sequence), b"");

        self.db.write(batch)?;
        Ok(())
    }

    async fn postings(&self, query: &PostingQuery) -> Result<Vec<Transaction>> {
        let postings = self.candidates(query)?;
        Ok(query.select(&postings))
    }

    async fn count_postings(&self, query: &PostingQuery) -> Result<u64> {
        let postings = self.candidates(query)?;
        Ok(query.count(&postings))
    }
}
