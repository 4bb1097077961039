use super::account::AccountId;
use super::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// Kind of money movement.
///
/// `Deposit`, `Withdrawal` and `Refund` are reserved: no current flow emits them,
/// but reports still classify them.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
pub enum TransactionKind {
    Transfer,
    Deposit,
    Withdrawal,
    Payment,
    CardPayment,
    CashDeposit,
    CashWithdrawal,
    Refund,
}

impl TransactionKind {
    /// Counts as money coming in when the account is the destination.
    pub fn is_deposit_like(&self) -> bool {
        matches!(
            self,
            TransactionKind::Transfer | TransactionKind::CashDeposit | TransactionKind::Deposit
        )
    }

    /// Counts as money taken out when the account is the source.
    pub fn is_withdrawal_like(&self) -> bool {
        matches!(
            self,
            TransactionKind::Withdrawal | TransactionKind::CashWithdrawal
        )
    }

    pub fn is_payment_like(&self) -> bool {
        matches!(
            self,
            TransactionKind::Payment | TransactionKind::CardPayment
        )
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentCategory {
    Utilities,
    Internet,
    Mobile,
    Insurance,
    Loan,
    Tax,
    Rent,
    Other,
}

impl fmt::Display for PaymentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One recorded money movement between two accounts.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
    pub description: String,
    pub status: TransactionStatus,
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl Transaction {
    pub fn pending(
        kind: TransactionKind,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Amount,
        description: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            from_account_id,
            to_account_id,
            amount,
            description,
            status: TransactionStatus::Pending,
            kind,
            created_at: now,
            completed_at: None,
            failure_reason: None,
        }
    }

    /// Pending -> Completed. Monetary fields are left untouched.
    pub fn complete(mut self, now: DateTime<Utc>) -> Self {
        self.status = TransactionStatus::Completed;
        self.completed_at = Some(now);
        self
    }

    pub fn touches(&self, account_id: AccountId) -> bool {
        self.from_account_id == account_id || self.to_account_id == account_id
    }
}

/// The normalized result of a money-movement operation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TransactionReceipt {
    #[serde(flatten)]
    pub transaction: Transaction,
    /// Payment recipient or merchant; not a ledger party.
    pub recipient_info: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pending_then_completed() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let completed = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 1).unwrap();
        let tx = Transaction::pending(
            TransactionKind::Transfer,
            AccountId::new(),
            AccountId::new(),
            Amount::new(dec!(5)).unwrap(),
            "rent share".to_string(),
            created,
        );
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.completed_at.is_none());

        let done = tx.clone().complete(completed);
        assert_eq!(done.status, TransactionStatus::Completed);
        assert_eq!(done.completed_at, Some(completed));
        assert_eq!(done.created_at, tx.created_at);
        assert_eq!(done.amount, tx.amount);
    }

    #[test]
    fn test_kind_classification() {
        assert!(TransactionKind::Transfer.is_deposit_like());
        assert!(TransactionKind::CashDeposit.is_deposit_like());
        assert!(TransactionKind::CashWithdrawal.is_withdrawal_like());
        assert!(TransactionKind::CardPayment.is_payment_like());
        assert!(!TransactionKind::Refund.is_deposit_like());
        assert!(!TransactionKind::Refund.is_payment_like());
    }

    #[test]
    fn test_receipt_serialization_is_flat() {
        let tx = Transaction::pending(
            TransactionKind::CardPayment,
            AccountId::new(),
            AccountId::new(),
            Amount::new(dec!(9.99)).unwrap(),
            "Purchase at Cafe. ".to_string(),
            Utc::now(),
        );
        let receipt = TransactionReceipt {
            transaction: tx,
            recipient_info: Some("Cafe".to_string()),
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["kind"], "CardPayment");
        assert_eq!(json["recipient_info"], "Cafe");
        assert_eq!(json["amount"], "9.99");
    }
}
