use crate::domain::account::{AccountKind, Currency};
use crate::domain::transaction::PaymentCategory;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Open,
    Deposit,
    Withdraw,
    Transfer,
    Payment,
    Card,
    Close,
}

/// One row of a batch file.
///
/// `user` is a numeric alias for a customer; `account` and `target` are
/// either aliases introduced by an `open` row or existing account numbers.
/// Columns a command does not use may be left empty or omitted.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    pub op: CommandKind,
    pub user: u32,
    pub account: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub kind: Option<AccountKind>,
    /// Recipient name for `payment`, merchant name for `card`.
    #[serde(default)]
    pub party: Option<String>,
    /// Recipient account for `payment`.
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub category: Option<PaymentCategory>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Reads batch commands from a CSV source, trimming whitespace and accepting
/// short rows.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows; a malformed row yields an error and the
    /// stream continues.
    pub fn commands(self) -> impl Iterator<Item = Result<CommandRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "op, user, account, target, amount, currency, kind, party, reference, category, description";

    #[test]
    fn test_reader_valid_stream() {
        let data = format!(
            "{HEADER}\n\
             open, 1, main, , , usd, savings\n\
             deposit, 1, main, , 100.50\n\
             payment, 1, main, , 20, , , Gas Co, 1234567890, utilities, March"
        );
        let results: Vec<Result<CommandRecord>> =
            CommandReader::new(data.as_bytes()).commands().collect();
        assert_eq!(results.len(), 3);

        let open = results[0].as_ref().unwrap();
        assert_eq!(open.op, CommandKind::Open);
        assert_eq!(open.currency, Some(Currency::new("USD").unwrap()));
        assert_eq!(open.kind, Some(AccountKind::Savings));
        assert_eq!(open.amount, None);

        let deposit = results[1].as_ref().unwrap();
        assert_eq!(deposit.amount, Some(dec!(100.50)));
        assert_eq!(deposit.description, None);

        let payment = results[2].as_ref().unwrap();
        assert_eq!(payment.party.as_deref(), Some("Gas Co"));
        assert_eq!(payment.reference.as_deref(), Some("1234567890"));
        assert_eq!(payment.category, Some(PaymentCategory::Utilities));
        assert_eq!(payment.description.as_deref(), Some("March"));
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = format!("{HEADER}\nrefund, 1, main, , 1.0\ndeposit, x, main, , 1.0\nclose, 1, main");
        let results: Vec<Result<CommandRecord>> =
            CommandReader::new(data.as_bytes()).commands().collect();

        assert!(results[0].is_err());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().op, CommandKind::Close);
    }
}
