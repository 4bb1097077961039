use crate::domain::account::{AccountId, Currency};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// The money-movement operation a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Transfer,
    Deposit,
    Withdrawal,
    Payment,
    CardPayment,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = match self {
            Operation::Transfer => "Transfer failed",
            Operation::Deposit => "Deposit failed",
            Operation::Withdrawal => "Cash withdrawal failed",
            Operation::Payment => "Payment failed",
            Operation::CardPayment => "Card payment failed",
        };
        f.write_str(summary)
    }
}

/// Coarse classification handed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Validation,
    Storage,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{0}")]
    NotFound(String),
    #[error("Account currencies do not match ({from} -> {to})")]
    CurrencyMismatch { from: Currency, to: Currency },
    #[error("Insufficient funds. Available: {available:.2}")]
    InsufficientFunds { available: Decimal },
    #[error("Daily cash withdrawal limit exceeded ({limit:.2}, already withdrawn today: {withdrawn:.2})")]
    DailyLimitExceeded { limit: Decimal, withdrawn: Decimal },
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("{operation}: {source}")]
    OperationFailed {
        operation: Operation,
        #[source]
        source: Box<LedgerError>,
    },
}

impl LedgerError {
    pub fn account_not_found(account_id: AccountId) -> Self {
        Self::NotFound(format!("Account {account_id} not found or access denied"))
    }

    /// Wraps the error with the summary of the operation that failed.
    pub fn during(self, operation: Operation) -> Self {
        Self::OperationFailed {
            operation,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping operation wrappers.
    pub fn root(&self) -> &LedgerError {
        match self {
            Self::OperationFailed { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.root() {
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::CurrencyMismatch { .. }
            | Self::InsufficientFunds { .. }
            | Self::DailyLimitExceeded { .. }
            | Self::ValidationError(_)
            | Self::CsvError(_) => ErrorCategory::Validation,
            _ => ErrorCategory::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_operation_wrapper_message() {
        let err = LedgerError::InsufficientFunds {
            available: dec!(12.5),
        }
        .during(Operation::Withdrawal);

        assert_eq!(
            err.to_string(),
            "Cash withdrawal failed: Insufficient funds. Available: 12.50"
        );
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(matches!(err.root(), LedgerError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_category_classification() {
        let missing = LedgerError::NotFound("gone".to_string());
        assert_eq!(missing.category(), ErrorCategory::NotFound);

        let storage = LedgerError::Conflict("balance changed".to_string());
        assert_eq!(storage.category(), ErrorCategory::Storage);
    }
}
