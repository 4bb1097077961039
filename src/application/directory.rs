use super::locks::AccountLocks;
use super::requests::{OpenAccountRequest, RegisterUserRequest};
use crate::domain::account::{
    Account, AccountId, Currency, SYSTEM_USER_EMAIL, SystemPurpose, User, UserId,
    generate_account_number,
};
use crate::domain::ports::{ClockRef, LedgerStoreRef, NewRecords};
use crate::error::{LedgerError, Result};
use tracing::{debug, info};

/// Attempts at drawing a free random account number before giving up.
const ACCOUNT_NUMBER_ATTEMPTS: usize = 5;

/// Resolves, creates and checks accounts and their owners.
#[derive(Clone)]
pub struct AccountDirectory {
    store: LedgerStoreRef,
    clock: ClockRef,
    locks: AccountLocks,
}

impl AccountDirectory {
    pub fn new(store: LedgerStoreRef, clock: ClockRef, locks: AccountLocks) -> Self {
        Self {
            store,
            clock,
            locks,
        }
    }

    pub async fn register_user(&self, request: RegisterUserRequest) -> Result<User> {
        let email = request.email.trim().to_ascii_lowercase();
        if !email.contains('@') || email.len() < 3 {
            return Err(LedgerError::ValidationError(format!(
                "Invalid email: {email:?}"
            )));
        }
        if email == SYSTEM_USER_EMAIL {
            return Err(LedgerError::ValidationError(
                "This email is reserved".to_string(),
            ));
        }
        if request.full_name.trim().is_empty() {
            return Err(LedgerError::ValidationError(
                "Full name is required".to_string(),
            ));
        }

        let user = User::new(
            &email,
            &request.full_name,
            &request.phone_number,
            self.clock.now(),
        );
        match self.store.insert_user(user.clone()).await {
            Ok(()) => {
                info!(user_id = %user.id, "user registered");
                Ok(user)
            }
            Err(LedgerError::Conflict(_)) => Err(LedgerError::ValidationError(
                "User with this email already exists".to_string(),
            )),
            Err(e) => Err(e),
        }
    }

    pub async fn open_account(
        &self,
        user_id: UserId,
        request: OpenAccountRequest,
    ) -> Result<Account> {
        match self.store.user(user_id).await? {
            Some(user) if user.active => {}
            _ => return Err(LedgerError::NotFound(format!("User {user_id} not found"))),
        }

        for _ in 0..ACCOUNT_NUMBER_ATTEMPTS {
            let now = self.clock.now();
            let account = Account::open(
                user_id,
                generate_account_number(now),
                request.currency.clone(),
                request.kind,
                now,
            );
            match self.store.insert_account(account.clone()).await {
                Ok(()) => {
                    info!(
                        %user_id,
                        account_id = %account.id,
                        number = %account.account_number,
                        currency = %account.currency,
                        "account opened"
                    );
                    return Ok(account);
                }
                Err(LedgerError::Conflict(_)) => {
                    debug!(number = %account.account_number, "account number taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(LedgerError::StorageError(
            "Could not allocate a unique account number".to_string(),
        ))
    }

    /// Active accounts of the user, oldest first.
    pub async fn user_accounts(&self, user_id: UserId) -> Result<Vec<Account>> {
        let accounts = self.store.accounts_for_user(user_id).await?;
        Ok(accounts.into_iter().filter(|a| a.active).collect())
    }

    /// The owner's view of one account, active or not.
    pub async fn account(&self, user_id: UserId, account_id: AccountId) -> Result<Account> {
        match self.store.account(account_id).await? {
            Some(account) if account.user_id == user_id => Ok(account),
            _ => Err(LedgerError::account_not_found(account_id)),
        }
    }

    /// Soft delete: the account stays in the ledger but accepts no postings.
    pub async fn deactivate_account(
        &self,
        user_id: UserId,
        account_id: AccountId,
    ) -> Result<Account> {
        let _guard = self.locks.acquire(&[account_id]).await;
        let mut account = self.owned_account(user_id, account_id).await?;
        self.store.set_account_active(account_id, false).await?;
        account.active = false;
        info!(%user_id, %account_id, "account deactivated");
        Ok(account)
    }

    /// The account if it exists, is active and belongs to `user_id`.
    pub async fn owned_account(&self, user_id: UserId, account_id: AccountId) -> Result<Account> {
        match self.store.account(account_id).await? {
            Some(account) if account.active && account.user_id == user_id => Ok(account),
            _ => Err(LedgerError::account_not_found(account_id)),
        }
    }

    /// The account if it exists and is active, whoever owns it.
    pub async fn active_account(&self, account_id: AccountId) -> Result<Account> {
        match self.store.account(account_id).await? {
            Some(account) if account.active => Ok(account),
            _ => Err(LedgerError::account_not_found(account_id)),
        }
    }

    pub async fn find_user(&self, email: &str) -> Result<Option<User>> {
        self.store
            .user_by_email(&email.trim().to_ascii_lowercase())
            .await
    }

    /// Active account by its public number, whoever owns it.
    pub async fn account_by_number(&self, number: &str) -> Result<Account> {
        match self.store.account_by_number(number).await? {
            Some(account) if account.active => Ok(account),
            _ => Err(LedgerError::NotFound(format!("Account {number} not found"))),
        }
    }

    pub async fn system_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts = self.store.system_accounts().await?;
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        Ok(accounts)
    }

    /// The system account for `purpose`, or on first use an unsaved one added
    /// to `created`, together with the system user when that is missing too.
    ///
    /// Nothing is written here: the posting's commit inserts the staged records,
    /// so a rejected posting leaves no system account behind.
    pub async fn stage_system_account(
        &self,
        purpose: SystemPurpose,
        currency: &Currency,
        created: &mut NewRecords,
    ) -> Result<Account> {
        let number = purpose.account_number(currency);
        if let Some(account) = self.store.account_by_number(&number).await? {
            return Ok(account);
        }
        if let Some(account) = created.accounts.iter().find(|a| a.account_number == number) {
            return Ok(account.clone());
        }

        let now = self.clock.now();
        let owner_id = match self.store.user_by_email(SYSTEM_USER_EMAIL).await? {
            Some(user) => user.id,
            None => created.user.get_or_insert_with(|| User::system(now)).id,
        };
        let account = Account::system(owner_id, purpose, currency.clone(), now);
        debug!(%number, account_id = %account.id, "system account staged");
        created.accounts.push(account.clone());
        Ok(account)
    }

    /// Get-or-create of the reserved system user.
    pub async fn system_user(&self) -> Result<User> {
        if let Some(user) = self.store.user_by_email(SYSTEM_USER_EMAIL).await? {
            return Ok(user);
        }
        match self.store.insert_user(User::system(self.clock.now())).await {
            Ok(()) | Err(LedgerError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
        self.store
            .user_by_email(SYSTEM_USER_EMAIL)
            .await?
            .ok_or_else(|| LedgerError::StorageError("system user missing after insert".to_string()))
    }

    /// Get-or-create of `SYSTEM_<PURPOSE>_<CURRENCY>`.
    ///
    /// The unique account number decides concurrent first uses: the loser of
    /// the insert race re-reads the winner's account.
    pub async fn system_account(
        &self,
        purpose: SystemPurpose,
        currency: &Currency,
    ) -> Result<Account> {
        let number = purpose.account_number(currency);
        if let Some(account) = self.store.account_by_number(&number).await? {
            return Ok(account);
        }

        let owner = self.system_user().await?;
        let candidate = Account::system(owner.id, purpose, currency.clone(), self.clock.now());
        match self.store.insert_account(candidate.clone()).await {
            Ok(()) => {
                info!(%number, account_id = %candidate.id, "system account created");
                Ok(candidate)
            }
            Err(LedgerError::Conflict(_)) => {
                debug!(%number, "system account created concurrently, re-reading");
                self.store
                    .account_by_number(&number)
                    .await?
                    .ok_or_else(|| {
                        LedgerError::StorageError(format!("system account {number} missing"))
                    })
            }
            Err(e) => Err(e),
        }
    }
}
