//! Inputs of the directory and engine operations.

use crate::domain::account::{AccountId, AccountKind, Currency};
use crate::domain::money::Amount;
use crate::domain::transaction::PaymentCategory;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserRequest {
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub phone_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAccountRequest {
    #[serde(default)]
    pub kind: AccountKind,
    pub currency: Currency,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositRequest {
    pub account_id: AccountId,
    pub amount: Amount,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalRequest {
    pub account_id: AccountId,
    pub amount: Amount,
    #[serde(default)]
    pub description: String,
}

/// A bill payment to a party outside the ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub from_account_id: AccountId,
    pub recipient_name: String,
    pub recipient_account: String,
    pub amount: Amount,
    pub category: PaymentCategory,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardPaymentRequest {
    pub account_id: AccountId,
    pub merchant_name: String,
    pub amount: Amount,
    #[serde(default)]
    pub description: String,
}
