use super::directory::AccountDirectory;
use super::history::HistoryCache;
use super::locks::AccountLocks;
use super::requests::{
    CardPaymentRequest, DepositRequest, PaymentRequest, TransferRequest, WithdrawalRequest,
};
use crate::config::LedgerConfig;
use crate::domain::account::{Account, AccountId, Currency, SystemPurpose, UserId};
use crate::domain::money::Amount;
use crate::domain::ports::{
    AccountSide, BalanceChange, ClockRef, LedgerCommit, LedgerStoreRef, NewRecords, PostingQuery,
};
use crate::domain::transaction::{
    Transaction, TransactionKind, TransactionReceipt, TransactionStatus,
};
use crate::error::{LedgerError, Operation, Result};
use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

const MIN_PARTY_NAME_LEN: usize = 2;
const MIN_RECIPIENT_ACCOUNT_LEN: usize = 10;
/// Tries at a posting whose commit lost a race, e.g. on a system account's first use.
const POST_ATTEMPTS: usize = 3;

/// One side of a posting.
enum Leg {
    Account(AccountId),
    /// The bank's account for the purpose and currency, created on first use.
    System(SystemPurpose, Currency),
}

/// One validated money movement, ready to be checked against live balances.
struct PostingPlan {
    kind: TransactionKind,
    from: Leg,
    to: Leg,
    amount: Amount,
    description: String,
    recipient_info: Option<String>,
}

/// Executes money movements between accounts.
///
/// Every operation moves one amount from a source to a destination account as
/// a single unit: one completed posting plus both balance changes, or nothing.
/// Cash and payment flows use the bank's system accounts as the counterparty,
/// so the sum of all balances never changes.
#[derive(Clone)]
pub struct TransactionEngine {
    store: LedgerStoreRef,
    directory: AccountDirectory,
    history: HistoryCache,
    clock: ClockRef,
    locks: AccountLocks,
    config: Arc<LedgerConfig>,
}

impl TransactionEngine {
    pub fn new(
        store: LedgerStoreRef,
        directory: AccountDirectory,
        history: HistoryCache,
        clock: ClockRef,
        locks: AccountLocks,
        config: Arc<LedgerConfig>,
    ) -> Self {
        Self {
            store,
            directory,
            history,
            clock,
            locks,
            config,
        }
    }

    /// Moves money from an account the caller owns to any active account.
    pub async fn transfer(
        &self,
        user_id: UserId,
        request: TransferRequest,
    ) -> Result<TransactionReceipt> {
        let result = self.transfer_unit(user_id, request).await;
        Self::settle(Operation::Transfer, result)
    }

    /// Cash deposit, funded by the bank's deposits account.
    pub async fn deposit(
        &self,
        user_id: UserId,
        request: DepositRequest,
    ) -> Result<TransactionReceipt> {
        let result = self.deposit_unit(user_id, request).await;
        Self::settle(Operation::Deposit, result)
    }

    /// Cash withdrawal, bounded by the daily withdrawal ceiling.
    pub async fn withdraw(
        &self,
        user_id: UserId,
        request: WithdrawalRequest,
    ) -> Result<TransactionReceipt> {
        let result = self.withdraw_unit(user_id, request).await;
        Self::settle(Operation::Withdrawal, result)
    }

    /// Bill payment to an outside recipient, settled into the payments account.
    pub async fn payment(
        &self,
        user_id: UserId,
        request: PaymentRequest,
    ) -> Result<TransactionReceipt> {
        let result = self.payment_unit(user_id, request).await;
        Self::settle(Operation::Payment, result)
    }

    /// Card purchase, settled into the merchants account.
    pub async fn card_payment(
        &self,
        user_id: UserId,
        request: CardPaymentRequest,
    ) -> Result<TransactionReceipt> {
        let result = self.card_payment_unit(user_id, request).await;
        Self::settle(Operation::CardPayment, result)
    }

    async fn transfer_unit(
        &self,
        user_id: UserId,
        request: TransferRequest,
    ) -> Result<TransactionReceipt> {
        self.check_description(&request.description)?;
        if request.from_account_id == request.to_account_id {
            return Err(LedgerError::ValidationError(
                "Cannot transfer to the same account".to_string(),
            ));
        }
        let source = self
            .directory
            .owned_account(user_id, request.from_account_id)
            .await?;
        let destination = self
            .directory
            .active_account(request.to_account_id)
            .await?;
        self.post(PostingPlan {
            kind: TransactionKind::Transfer,
            from: Leg::Account(source.id),
            to: Leg::Account(destination.id),
            amount: request.amount,
            description: request.description,
            recipient_info: None,
        })
        .await
    }

    async fn deposit_unit(
        &self,
        user_id: UserId,
        request: DepositRequest,
    ) -> Result<TransactionReceipt> {
        self.check_description(&request.description)?;
        if request.amount.value() > self.config.max_deposit_amount {
            return Err(LedgerError::ValidationError(format!(
                "Deposit amount exceeds the maximum of {:.2}",
                self.config.max_deposit_amount
            )));
        }
        let destination = self
            .directory
            .owned_account(user_id, request.account_id)
            .await?;
        self.post(PostingPlan {
            kind: TransactionKind::CashDeposit,
            from: Leg::System(SystemPurpose::Deposits, destination.currency),
            to: Leg::Account(destination.id),
            amount: request.amount,
            description: or_default(request.description, "Account top-up"),
            recipient_info: None,
        })
        .await
    }

    async fn withdraw_unit(
        &self,
        user_id: UserId,
        request: WithdrawalRequest,
    ) -> Result<TransactionReceipt> {
        self.check_description(&request.description)?;
        let source = self
            .directory
            .owned_account(user_id, request.account_id)
            .await?;
        self.post(PostingPlan {
            kind: TransactionKind::CashWithdrawal,
            from: Leg::Account(source.id),
            to: Leg::System(SystemPurpose::Withdrawals, source.currency),
            amount: request.amount,
            description: or_default(request.description, "Cash withdrawal"),
            recipient_info: None,
        })
        .await
    }

    async fn payment_unit(
        &self,
        user_id: UserId,
        request: PaymentRequest,
    ) -> Result<TransactionReceipt> {
        self.check_description(&request.description)?;
        let recipient_name = request.recipient_name.trim();
        let recipient_account = request.recipient_account.trim();
        if recipient_name.chars().count() < MIN_PARTY_NAME_LEN {
            return Err(LedgerError::ValidationError(format!(
                "Recipient name must be at least {MIN_PARTY_NAME_LEN} characters"
            )));
        }
        if recipient_account.chars().count() < MIN_RECIPIENT_ACCOUNT_LEN {
            return Err(LedgerError::ValidationError(format!(
                "Recipient account must be at least {MIN_RECIPIENT_ACCOUNT_LEN} characters"
            )));
        }
        let source = self
            .directory
            .owned_account(user_id, request.from_account_id)
            .await?;
        let description = format!(
            "Payment: {} - {recipient_name} ({recipient_account}). {}",
            request.category, request.description
        );
        self.post(PostingPlan {
            kind: TransactionKind::Payment,
            from: Leg::Account(source.id),
            to: Leg::System(SystemPurpose::Payments, source.currency),
            amount: request.amount,
            description: description.trim_end().to_string(),
            recipient_info: Some(format!("{recipient_name} ({recipient_account})")),
        })
        .await
    }

    async fn card_payment_unit(
        &self,
        user_id: UserId,
        request: CardPaymentRequest,
    ) -> Result<TransactionReceipt> {
        self.check_description(&request.description)?;
        let merchant = request.merchant_name.trim();
        if merchant.chars().count() < MIN_PARTY_NAME_LEN {
            return Err(LedgerError::ValidationError(format!(
                "Merchant name must be at least {MIN_PARTY_NAME_LEN} characters"
            )));
        }
        let source = self
            .directory
            .owned_account(user_id, request.account_id)
            .await?;
        let description = format!("Purchase at {merchant}. {}", request.description);
        self.post(PostingPlan {
            kind: TransactionKind::CardPayment,
            from: Leg::Account(source.id),
            to: Leg::System(SystemPurpose::Merchants, source.currency),
            amount: request.amount,
            description: description.trim_end().to_string(),
            recipient_info: Some(merchant.to_string()),
        })
        .await
    }

    fn settle(
        operation: Operation,
        result: Result<TransactionReceipt>,
    ) -> Result<TransactionReceipt> {
        result.map_err(|e| {
            warn!(error = %e, "{operation}");
            e.during(operation)
        })
    }

    fn check_description(&self, description: &str) -> Result<()> {
        let limit = self.config.max_description_len;
        if description.chars().count() > limit {
            return Err(LedgerError::ValidationError(format!(
                "Description must be at most {limit} characters"
            )));
        }
        Ok(())
    }

    async fn post(&self, plan: PostingPlan) -> Result<TransactionReceipt> {
        let mut attempt = 1;
        loop {
            match self.try_post(&plan).await {
                Err(LedgerError::Conflict(reason)) if attempt < POST_ATTEMPTS => {
                    debug!(attempt, %reason, "posting lost a race, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_post(&self, plan: &PostingPlan) -> Result<TransactionReceipt> {
        let mut created = NewRecords::default();
        let from = self.resolve(&plan.from, &mut created).await?;
        let to = self.resolve(&plan.to, &mut created).await?;
        let guards = self.locks.acquire(&[from, to]).await;

        // Balances and the active flag are only trusted once the locks are held.
        let source = self.locked_account(from, &created).await?;
        let destination = self.locked_account(to, &created).await?;

        if !source.is_system() && !destination.is_system() && source.currency != destination.currency
        {
            return Err(LedgerError::CurrencyMismatch {
                from: source.currency,
                to: destination.currency,
            });
        }
        if !source.can_debit(plan.amount) {
            return Err(LedgerError::InsufficientFunds {
                available: source.balance.value(),
            });
        }

        let now = self.clock.now();
        if plan.kind == TransactionKind::CashWithdrawal {
            let limit = self.config.daily_withdrawal_limit;
            let withdrawn = self.withdrawn_on_day(source.id, now).await?;
            if withdrawn + plan.amount.value() > limit {
                return Err(LedgerError::DailyLimitExceeded { limit, withdrawn });
            }
        }

        let posting = Transaction::pending(
            plan.kind,
            source.id,
            destination.id,
            plan.amount,
            plan.description.clone(),
            now,
        )
        .complete(now);
        let opened: Vec<String> = created
            .accounts
            .iter()
            .map(|a| a.account_number.clone())
            .collect();

        self.store
            .commit(LedgerCommit {
                posting: posting.clone(),
                balances: vec![
                    BalanceChange {
                        account_id: source.id,
                        expected: source.balance,
                        updated: source.balance.debited(plan.amount),
                    },
                    BalanceChange {
                        account_id: destination.id,
                        expected: destination.balance,
                        updated: destination.balance.credited(plan.amount),
                    },
                ],
                created,
            })
            .await?;
        drop(guards);

        for number in opened {
            info!(%number, "system account created");
        }
        info!(
            transaction_id = %posting.id,
            kind = ?posting.kind,
            from = %posting.from_account_id,
            to = %posting.to_account_id,
            amount = %posting.amount,
            "posting completed"
        );

        self.history.invalidate(&[source.id, destination.id]).await;

        Ok(TransactionReceipt {
            transaction: posting,
            recipient_info: plan.recipient_info.clone(),
        })
    }

    async fn resolve(&self, leg: &Leg, created: &mut NewRecords) -> Result<AccountId> {
        match leg {
            Leg::Account(account_id) => Ok(*account_id),
            Leg::System(purpose, currency) => {
                let account = self
                    .directory
                    .stage_system_account(*purpose, currency, created)
                    .await?;
                Ok(account.id)
            }
        }
    }

    /// Current state of a posting side; staged system accounts are not stored yet.
    async fn locked_account(&self, account_id: AccountId, created: &NewRecords) -> Result<Account> {
        match created.account(account_id) {
            Some(account) => Ok(account.clone()),
            None => self.directory.active_account(account_id).await,
        }
    }

    /// Sum of completed cash withdrawals from the account on the UTC day of `now`.
    async fn withdrawn_on_day(&self, account_id: AccountId, now: DateTime<Utc>) -> Result<Decimal> {
        let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let query = PostingQuery {
            account_id: Some(account_id),
            side: AccountSide::Source,
            kinds: Some(vec![TransactionKind::CashWithdrawal]),
            status: Some(TransactionStatus::Completed),
            since: Some(start),
            until: Some(start + TimeDelta::days(1) - TimeDelta::nanoseconds(1)),
            ..PostingQuery::default()
        };
        let postings = self.store.postings(&query).await?;
        Ok(postings.iter().map(|tx| tx.amount.value()).sum())
    }
}

fn or_default(description: String, fallback: &str) -> String {
    if description.trim().is_empty() {
        fallback.to_string()
    } else {
        description
    }
}
