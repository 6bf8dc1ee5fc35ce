use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{
        BankVerificationStatus,
        KycStatus,
        LinkedAccountStatus,
        NewBankAccount,
        SellerBankAccount,
        SellerKyc,
        SellerLinkedAccount,
    },
    traits::{SellerVerification, VerificationError},
};

/// `SellerApi` manages the records that gate payout eligibility: KYC, bank accounts, and the
/// gateway's sub-merchant linkage.
pub struct SellerApi<B> {
    db: B,
}

impl<B> Debug for SellerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SellerApi")
    }
}

impl<B> SellerApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> SellerApi<B>
where B: SellerVerification
{
    pub async fn submit_kyc(
        &self,
        seller_id: &str,
        legal_name: &str,
        pan_number: &str,
    ) -> Result<SellerKyc, VerificationError> {
        let kyc = self.db.upsert_kyc(seller_id, legal_name, pan_number).await?;
        info!("🪪️ KYC submitted for seller {seller_id} ({})", kyc.status);
        Ok(kyc)
    }

    pub async fn set_kyc_status(&self, seller_id: &str, status: KycStatus) -> Result<SellerKyc, VerificationError> {
        self.db.set_kyc_status(seller_id, status).await
    }

    pub async fn kyc_for(&self, seller_id: &str) -> Result<Option<SellerKyc>, VerificationError> {
        self.db.fetch_kyc(seller_id).await
    }

    pub async fn add_bank_account(&self, account: NewBankAccount) -> Result<SellerBankAccount, VerificationError> {
        let seller = account.seller_id.clone();
        let added = self.db.add_bank_account(account).await?;
        info!("🪪️ Bank account {} added for seller {seller} (primary: {})", added.id, added.is_primary);
        Ok(added)
    }

    /// Records the penny-drop verification outcome for a bank account.
    pub async fn record_bank_verification(
        &self,
        account_id: i64,
        status: BankVerificationStatus,
    ) -> Result<SellerBankAccount, VerificationError> {
        let account = self.db.set_bank_verification(account_id, status).await?;
        info!("🪪️ Bank account {account_id} verification is now {status}");
        Ok(account)
    }

    pub async fn primary_bank_account(&self, seller_id: &str) -> Result<Option<SellerBankAccount>, VerificationError> {
        self.db.fetch_primary_bank_account(seller_id).await
    }

    pub async fn link_gateway_account(
        &self,
        seller_id: &str,
        gateway_account_id: &str,
    ) -> Result<SellerLinkedAccount, VerificationError> {
        self.db.upsert_linked_account(seller_id, gateway_account_id).await
    }

    pub async fn set_linked_account_status(
        &self,
        seller_id: &str,
        status: LinkedAccountStatus,
    ) -> Result<SellerLinkedAccount, VerificationError> {
        self.db.set_linked_account_status(seller_id, status).await
    }

    pub async fn linked_account(&self, seller_id: &str) -> Result<Option<SellerLinkedAccount>, VerificationError> {
        self.db.fetch_linked_account(seller_id).await
    }
}
