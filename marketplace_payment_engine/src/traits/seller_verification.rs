use thiserror::Error;

use crate::db_types::{
    BankVerificationStatus,
    KycStatus,
    LinkedAccountStatus,
    NewBankAccount,
    SellerBankAccount,
    SellerKyc,
    SellerLinkedAccount,
};

/// Seller identity and payout-destination records. Not complex in itself, but payout eligibility
/// is gated on what lives here, so mutation rules matter: exactly one primary bank account per
/// seller, and linked-account status moves only along its lifecycle.
#[allow(async_fn_in_trait)]
pub trait SellerVerification: Clone {
    async fn upsert_kyc(
        &self,
        seller_id: &str,
        legal_name: &str,
        pan_number: &str,
    ) -> Result<SellerKyc, VerificationError>;

    async fn set_kyc_status(&self, seller_id: &str, status: KycStatus) -> Result<SellerKyc, VerificationError>;

    async fn fetch_kyc(&self, seller_id: &str) -> Result<Option<SellerKyc>, VerificationError>;

    /// Adds a bank account. When `is_primary` is set, any other primary for the seller is demoted
    /// in the same transaction, preserving the at-most-one-primary invariant.
    async fn add_bank_account(&self, account: NewBankAccount) -> Result<SellerBankAccount, VerificationError>;

    /// Records the outcome of the penny-drop style verification.
    async fn set_bank_verification(
        &self,
        account_id: i64,
        status: BankVerificationStatus,
    ) -> Result<SellerBankAccount, VerificationError>;

    /// The seller's active, primary bank account, if any.
    async fn fetch_primary_bank_account(
        &self,
        seller_id: &str,
    ) -> Result<Option<SellerBankAccount>, VerificationError>;

    async fn upsert_linked_account(
        &self,
        seller_id: &str,
        gateway_account_id: &str,
    ) -> Result<SellerLinkedAccount, VerificationError>;

    /// Moves the linked account along its lifecycle; transitions outside the table are rejected.
    async fn set_linked_account_status(
        &self,
        seller_id: &str,
        status: LinkedAccountStatus,
    ) -> Result<SellerLinkedAccount, VerificationError>;

    async fn fetch_linked_account(&self, seller_id: &str)
        -> Result<Option<SellerLinkedAccount>, VerificationError>;
}

#[derive(Debug, Clone, Error)]
pub enum VerificationError {
    #[error("No record found for seller {0}")]
    NotFound(String),
    #[error("No bank account with id {0}")]
    BankAccountNotFound(i64),
    #[error("Illegal linked account status change from {from} to {to}")]
    IllegalStatusChange { from: LinkedAccountStatus, to: LinkedAccountStatus },
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for VerificationError {
    fn from(e: sqlx::Error) -> Self {
        VerificationError::DatabaseError(e.to_string())
    }
}
