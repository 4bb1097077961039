use super::account_writer::AccountRow;
use super::command_reader::{CommandKind, CommandRecord};
use crate::application::Bank;
use crate::application::requests::{
    CardPaymentRequest, DepositRequest, OpenAccountRequest, PaymentRequest, RegisterUserRequest,
    TransferRequest, WithdrawalRequest,
};
use crate::domain::account::{AccountId, UserId};
use crate::domain::money::Amount;
use crate::error::{LedgerError, Result};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct AccountRef {
    owner: UserId,
    id: AccountId,
}

/// Applies batch commands to a bank, resolving the file's aliases.
///
/// User aliases map to `user-<n>@ledger.local` and are registered on first
/// use, or picked up from the store when a persistent ledger already has them.
pub struct BatchRunner {
    bank: Bank,
    users: HashMap<u32, UserId>,
    accounts: BTreeMap<String, AccountRef>,
}

fn missing(column: &str, op: CommandKind) -> LedgerError {
    LedgerError::ValidationError(format!("{op:?} command requires the {column} column"))
}

impl BatchRunner {
    pub fn new(bank: Bank) -> Self {
        Self {
            bank,
            users: HashMap::new(),
            accounts: BTreeMap::new(),
        }
    }

    pub async fn apply(&mut self, command: CommandRecord) -> Result<()> {
        let user_id = self.user(command.user).await?;
        let op = command.op;
        let description = command.description.unwrap_or_default();
        let amount = match command.amount {
            Some(value) => Some(Amount::new(value)?),
            None => None,
        };

        match op {
            CommandKind::Open => {
                if self.accounts.contains_key(&command.account) {
                    return Err(LedgerError::ValidationError(format!(
                        "Account alias {} is already in use",
                        command.account
                    )));
                }
                let currency = command.currency.ok_or_else(|| missing("currency", op))?;
                let account = self
                    .bank
                    .directory
                    .open_account(
                        user_id,
                        OpenAccountRequest {
                            kind: command.kind.unwrap_or_default(),
                            currency,
                        },
                    )
                    .await?;
                self.accounts.insert(
                    command.account,
                    AccountRef {
                        owner: user_id,
                        id: account.id,
                    },
                );
            }
            CommandKind::Deposit => {
                let account_id = self.account(&command.account).await?;
                self.bank
                    .engine
                    .deposit(
                        user_id,
                        DepositRequest {
                            account_id,
                            amount: amount.ok_or_else(|| missing("amount", op))?,
                            description,
                        },
                    )
                    .await?;
            }
            CommandKind::Withdraw => {
                let account_id = self.account(&command.account).await?;
                self.bank
                    .engine
                    .withdraw(
                        user_id,
                        WithdrawalRequest {
                            account_id,
                            amount: amount.ok_or_else(|| missing("amount", op))?,
                            description,
                        },
                    )
                    .await?;
            }
            CommandKind::Transfer => {
                let target = command.target.ok_or_else(|| missing("target", op))?;
                let from_account_id = self.account(&command.account).await?;
                let to_account_id = self.account(&target).await?;
                self.bank
                    .engine
                    .transfer(
                        user_id,
                        TransferRequest {
                            from_account_id,
                            to_account_id,
                            amount: amount.ok_or_else(|| missing("amount", op))?,
                            description,
                        },
                    )
                    .await?;
            }
            CommandKind::Payment => {
                let from_account_id = self.account(&command.account).await?;
                self.bank
                    .engine
                    .payment(
                        user_id,
                        PaymentRequest {
                            from_account_id,
                            recipient_name: command.party.ok_or_else(|| missing("party", op))?,
                            recipient_account: command
                                .reference
                                .ok_or_else(|| missing("reference", op))?,
                            amount: amount.ok_or_else(|| missing("amount", op))?,
                            category: command.category.ok_or_else(|| missing("category", op))?,
                            description,
                        },
                    )
                    .await?;
            }
            CommandKind::Card => {
                let account_id = self.account(&command.account).await?;
                self.bank
                    .engine
                    .card_payment(
                        user_id,
                        CardPaymentRequest {
                            account_id,
                            merchant_name: command.party.ok_or_else(|| missing("party", op))?,
                            amount: amount.ok_or_else(|| missing("amount", op))?,
                            description,
                        },
                    )
                    .await?;
            }
            CommandKind::Close => {
                let account_id = self.account(&command.account).await?;
                self.bank
                    .directory
                    .deactivate_account(user_id, account_id)
                    .await?;
            }
        }
        Ok(())
    }

    async fn user(&mut self, alias: u32) -> Result<UserId> {
        if let Some(user_id) = self.users.get(&alias) {
            return Ok(*user_id);
        }
        let email = format!("user-{alias}@ledger.local");
        let user = match self.bank.directory.find_user(&email).await? {
            Some(user) => user,
            None => {
                self.bank
                    .directory
                    .register_user(RegisterUserRequest {
                        email,
                        full_name: format!("Customer {alias}"),
                        phone_number: String::new(),
                    })
                    .await?
            }
        };
        debug!(alias, user_id = %user.id, "user alias resolved");
        self.users.insert(alias, user.id);
        Ok(user.id)
    }

    async fn account(&mut self, reference: &str) -> Result<AccountId> {
        if let Some(found) = self.accounts.get(reference) {
            return Ok(found.id);
        }
        let account = self.bank.directory.account_by_number(reference).await?;
        self.accounts.insert(
            reference.to_string(),
            AccountRef {
                owner: account.user_id,
                id: account.id,
            },
        );
        Ok(account.id)
    }

    /// Every account the batch referenced, by reference, then the system accounts.
    pub async fn account_rows(&self) -> Result<Vec<AccountRow>> {
        let mut rows = Vec::with_capacity(self.accounts.len());
        for (reference, found) in &self.accounts {
            let account = self.bank.directory.account(found.owner, found.id).await?;
            rows.push(AccountRow::new(reference, &account));
        }
        for account in self.bank.directory.system_accounts().await? {
            rows.push(AccountRow::new(&account.account_number, &account));
        }
        Ok(rows)
    }
}
