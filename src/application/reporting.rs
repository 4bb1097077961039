use super::directory::AccountDirectory;
use super::history::HistoryCache;
use crate::config::LedgerConfig;
use crate::domain::account::{AccountId, UserId};
use crate::domain::ports::{ClockRef, LedgerStoreRef, PostingQuery};
use crate::domain::report::{AccountStatement, BankStatistics, Page, StatementPeriod};
use crate::domain::transaction::{Transaction, TransactionKind, TransactionStatus};
use crate::error::{LedgerError, Result};
use std::sync::Arc;
use tracing::debug;

/// Read-only views over the ledger.
#[derive(Clone)]
pub struct ReportingEngine {
    store: LedgerStoreRef,
    directory: AccountDirectory,
    history: HistoryCache,
    clock: ClockRef,
    config: Arc<LedgerConfig>,
}

impl ReportingEngine {
    pub fn new(
        store: LedgerStoreRef,
        directory: AccountDirectory,
        history: HistoryCache,
        clock: ClockRef,
        config: Arc<LedgerConfig>,
    ) -> Self {
        Self {
            store,
            directory,
            history,
            clock,
            config,
        }
    }

    /// Postings touching the account, most recent first. `page` is 1-based.
    pub async fn account_transactions(
        &self,
        account_id: AccountId,
        user_id: UserId,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Transaction>> {
        if page == 0 {
            return Err(LedgerError::ValidationError(
                "Page number starts at 1".to_string(),
            ));
        }
        let max_page_size = self.config.max_page_size;
        if page_size == 0 || page_size > max_page_size {
            return Err(LedgerError::ValidationError(format!(
                "Page size must be between 1 and {max_page_size}"
            )));
        }
        self.directory.owned_account(user_id, account_id).await?;

        let key = self.history.page_key(account_id, page, page_size).await;
        if let Some(cached) = self.history.load(&key).await {
            return Ok(cached);
        }
        debug!(%account_id, page, page_size, "history cache miss");

        let mut query = PostingQuery::for_account(account_id);
        let total_count = self.store.count_postings(&query).await?;
        query.offset = (page as usize - 1) * page_size as usize;
        query.limit = Some(page_size as usize);
        let items = self.store.postings(&query).await?;

        let result = Page {
            items,
            total_count,
            page_number: page,
            page_size,
        };
        self.history.store(&key, &result).await;
        Ok(result)
    }

    pub async fn account_statement(
        &self,
        account_id: AccountId,
        user_id: UserId,
        period: StatementPeriod,
    ) -> Result<AccountStatement> {
        let period = StatementPeriod::new(period.start, period.end)?;
        let account = self.directory.owned_account(user_id, account_id).await?;

        let query = PostingQuery {
            account_id: Some(account_id),
            status: Some(TransactionStatus::Completed),
            since: Some(period.start),
            until: Some(period.end),
            ..PostingQuery::default()
        };
        let transactions = self.store.postings(&query).await?;

        Ok(AccountStatement::build(
            account.id,
            account.account_number,
            account.balance,
            period,
            transactions,
        ))
    }

    /// Bank-wide totals over every completed posting.
    pub async fn bank_statistics(&self) -> Result<BankStatistics> {
        let query = PostingQuery {
            status: Some(TransactionStatus::Completed),
            ..PostingQuery::default()
        };
        let completed = self.store.postings(&query).await?;

        let mut stats = BankStatistics::default();
        for tx in &completed {
            let amount = tx.amount.value();
            match tx.kind {
                TransactionKind::CashDeposit | TransactionKind::Deposit => {
                    stats.total_deposits += amount
                }
                TransactionKind::CashWithdrawal | TransactionKind::Withdrawal => {
                    stats.total_withdrawals += amount
                }
                TransactionKind::Payment => stats.total_payments += amount,
                TransactionKind::CardPayment => stats.total_merchant_payments += amount,
                TransactionKind::Transfer => stats.total_transfers += amount,
                TransactionKind::Refund => {}
            }
        }
        stats.total_transaction_count = completed.len();
        stats.system_account_balances = self
            .store
            .system_accounts()
            .await?
            .into_iter()
            .map(|account| (account.account_number, account.balance))
            .collect();
        stats.generated_at = Some(self.clock.now());
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use crate::application::requests::{
        CardPaymentRequest, DepositRequest, OpenAccountRequest, PaymentRequest,
        RegisterUserRequest, TransferRequest, WithdrawalRequest,
    };
    use crate::application::Bank;
    use crate::config::LedgerConfig;
    use crate::domain::account::{Account, AccountKind, Currency, UserId};
    use crate::domain::money::{Amount, Balance};
    use crate::domain::ports::Clock;
    use crate::domain::report::StatementPeriod;
    use crate::domain::transaction::{PaymentCategory, TransactionKind};
    use crate::error::LedgerError;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::in_memory::{InMemoryCache, InMemoryLedgerStore};
    use chrono::{TimeDelta, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn bank_at(clock: &ManualClock) -> Bank {
        Bank::new(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(InMemoryCache::with_clock(Arc::new(clock.clone()))),
            Arc::new(clock.clone()),
            LedgerConfig::default(),
        )
    }

    async fn customer(bank: &Bank, email: &str) -> (UserId, Account) {
        let user = bank
            .directory
            .register_user(RegisterUserRequest {
                email: email.to_string(),
                full_name: "Test User".to_string(),
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
                    currency: Currency::new("USD").unwrap(),
                },
            )
            .await
            .unwrap();
        (user.id, account)
    }

    fn amount(value: Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    async fn deposit(bank: &Bank, user: UserId, account: &Account, value: Decimal) {
        bank.engine
            .deposit(
                user,
                DepositRequest {
                    account_id: account.id,
                    amount: amount(value),
                    description: String::new(),
                },
            )
            .await
            .unwrap();
    }

    async fn withdraw(bank: &Bank, user: UserId, account: &Account, value: Decimal) {
        bank.engine
            .withdraw(
                user,
                WithdrawalRequest {
                    account_id: account.id,
                    amount: amount(value),
                    description: String::new(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_statement_totals() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let bank = bank_at(&clock);
        let (ann, ann_account) = customer(&bank, "ann@example.com").await;
        let (bob, bob_account) = customer(&bank, "bob@example.com").await;
        let start = clock.now();

        deposit(&bank, ann, &ann_account, dec!(500)).await;
        clock.advance(TimeDelta::minutes(1));
        deposit(&bank, bob, &bob_account, dec!(80)).await;
        clock.advance(TimeDelta::minutes(1));
        bank.engine
            .transfer(
                bob,
                TransferRequest {
                    from_account_id: bob_account.id,
                    to_account_id: ann_account.id,
                    amount: amount(dec!(30)),
                    description: "lunch".to_string(),
                },
            )
            .await
            .unwrap();
        clock.advance(TimeDelta::minutes(1));
        withdraw(&bank, ann, &ann_account, dec!(100)).await;
        clock.advance(TimeDelta::minutes(1));
        bank.engine
            .payment(
                ann,
                PaymentRequest {
                    from_account_id: ann_account.id,
                    recipient_name: "Water Co".to_string(),
                    recipient_account: "9988776655".to_string(),
                    amount: amount(dec!(20)),
                    category: PaymentCategory::Utilities,
                    description: String::new(),
                },
            )
            .await
            .unwrap();
        clock.advance(TimeDelta::minutes(1));
        bank.engine
            .card_payment(
                ann,
                CardPaymentRequest {
                    account_id: ann_account.id,
                    merchant_name: "Bookshop".to_string(),
                    amount: amount(dec!(15)),
                    description: String::new(),
                },
            )
            .await
            .unwrap();

        let period = StatementPeriod::new(start, clock.now()).unwrap();
        let statement = bank
            .reporting
            .account_statement(ann_account.id, ann, period)
            .await
            .unwrap();

        assert_eq!(statement.total_deposits, dec!(530));
        assert_eq!(statement.total_withdrawals, dec!(100));
        assert_eq!(statement.total_payments, dec!(35));
        assert_eq!(statement.transaction_count, 5);
        assert_eq!(statement.current_balance, Balance(dec!(395)));
        assert_eq!(
            statement.current_balance.value(),
            statement.total_deposits - statement.total_withdrawals - statement.total_payments
        );
        assert_eq!(statement.transactions[0].kind, TransactionKind::CardPayment);
    }

    #[tokio::test]
    async fn test_statement_empty_window() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let bank = bank_at(&clock);
        let (ann, account) = customer(&bank, "ann@example.com").await;
        deposit(&bank, ann, &account, dec!(10)).await;

        let later = clock.now() + TimeDelta::days(3);
        let period = StatementPeriod::new(later, later + TimeDelta::days(1)).unwrap();
        let statement = bank
            .reporting
            .account_statement(account.id, ann, period)
            .await
            .unwrap();

        assert_eq!(statement.total_deposits, Decimal::ZERO);
        assert_eq!(statement.transaction_count, 0);
        assert!(statement.transactions.is_empty());
        assert_eq!(statement.current_balance, Balance(dec!(10)));
    }

    #[tokio::test]
    async fn test_statement_rejects_inverted_period() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let bank = bank_at(&clock);
        let (ann, account) = customer(&bank, "ann@example.com").await;
        let now = clock.now();

        let inverted = StatementPeriod {
            start: now,
            end: now - TimeDelta::days(1),
        };
        let result = bank
            .reporting
            .account_statement(account.id, ann, inverted)
            .await;
        assert!(matches!(result, Err(LedgerError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_history_pages_most_recent_first() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let bank = bank_at(&clock);
        let (ann, account) = customer(&bank, "ann@example.com").await;
        for value in 1..=5 {
            deposit(&bank, ann, &account, Decimal::from(value)).await;
            clock.advance(TimeDelta::seconds(1));
        }

        let first = bank
            .reporting
            .account_transactions(account.id, ann, 1, 2)
            .await
            .unwrap();
        assert_eq!(first.total_count, 5);
        assert_eq!(first.total_pages(), 3);
        let amounts: Vec<Decimal> = first.items.iter().map(|tx| tx.amount.value()).collect();
        assert_eq!(amounts, vec![dec!(5), dec!(4)]);

        let last = bank
            .reporting
            .account_transactions(account.id, ann, 3, 2)
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].amount.value(), dec!(1));

        let beyond = bank
            .reporting
            .account_transactions(account.id, ann, 4, 2)
            .await
            .unwrap();
        assert!(beyond.items.is_empty());
    }

    #[tokio::test]
    async fn test_history_reflects_writes_after_caching() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let bank = bank_at(&clock);
        let (ann, account) = customer(&bank, "ann@example.com").await;
        deposit(&bank, ann, &account, dec!(100)).await;

        let before = bank
            .reporting
            .account_transactions(account.id, ann, 1, 10)
            .await
            .unwrap();
        assert_eq!(before.total_count, 1);

        clock.advance(TimeDelta::seconds(1));
        withdraw(&bank, ann, &account, dec!(40)).await;

        let after = bank
            .reporting
            .account_transactions(account.id, ann, 1, 10)
            .await
            .unwrap();
        assert_eq!(after.total_count, 2);
        assert_eq!(after.items[0].kind, TransactionKind::CashWithdrawal);
    }

    #[tokio::test]
    async fn test_history_page_bounds_and_ownership() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let bank = bank_at(&clock);
        let (ann, account) = customer(&bank, "ann@example.com").await;
        let (bob, _) = customer(&bank, "bob@example.com").await;

        for (page, size) in [(0, 10), (1, 0), (1, 101)] {
            let result = bank
                .reporting
                .account_transactions(account.id, ann, page, size)
                .await;
            assert!(matches!(result, Err(LedgerError::ValidationError(_))));
        }

        let foreign = bank
            .reporting
            .account_transactions(account.id, bob, 1, 10)
            .await;
        assert!(matches!(foreign, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_bank_statistics_breakdown() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
        let bank = bank_at(&clock);
        let (ann, ann_account) = customer(&bank, "ann@example.com").await;
        let (_, bob_account) = customer(&bank, "bob@example.com").await;

        deposit(&bank, ann, &ann_account, dec!(300)).await;
        withdraw(&bank, ann, &ann_account, dec!(50)).await;
        bank.engine
            .transfer(
                ann,
                TransferRequest {
                    from_account_id: ann_account.id,
                    to_account_id: bob_account.id,
                    amount: amount(dec!(25)),
                    description: String::new(),
                },
            )
            .await
            .unwrap();
        bank.engine
            .payment(
                ann,
                PaymentRequest {
                    from_account_id: ann_account.id,
                    recipient_name: "Landlord".to_string(),
                    recipient_account: "DE00123456789".to_string(),
                    amount: amount(dec!(100)),
                    category: PaymentCategory::Rent,
                    description: String::new(),
                },
            )
            .await
            .unwrap();
        bank.engine
            .card_payment(
                ann,
                CardPaymentRequest {
                    account_id: ann_account.id,
                    merchant_name: "Grocer".to_string(),
                    amount: amount(dec!(12.34)),
                    description: String::new(),
                },
            )
            .await
            .unwrap();

        let stats = bank.reporting.bank_statistics().await.unwrap();
        assert_eq!(stats.total_deposits, dec!(300));
        assert_eq!(stats.total_withdrawals, dec!(50));
        assert_eq!(stats.total_transfers, dec!(25));
        assert_eq!(stats.total_payments, dec!(100));
        assert_eq!(stats.total_merchant_payments, dec!(12.34));
        assert_eq!(stats.total_transaction_count, 5);
        assert_eq!(stats.generated_at, Some(clock.now()));
        assert_eq!(
            stats.system_account_balances["SYSTEM_DEPOSITS_USD"],
            Balance(dec!(-300))
        );
        assert_eq!(
            stats.system_account_balances["SYSTEM_MERCHANTS_USD"],
            Balance(dec!(12.34))
        );
        assert_eq!(stats.system_account_balances.len(), 4);
    }
}
