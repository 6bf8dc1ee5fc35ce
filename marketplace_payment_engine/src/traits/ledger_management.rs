use mpg_common::Money;
use thiserror::Error;

use crate::db_types::{AccountType, LedgerEntry, NewLedgerEntry, TransactionType};

/// Append-only double-entry bookkeeping.
///
/// This is the single source of truth for money position. No component may compute a balance any
/// other way than through [`LedgerManagement::balance_for`] (the payout-availability query over
/// splits is a different quantity, not a balance).
#[allow(async_fn_in_trait)]
pub trait LedgerManagement: Clone {
    /// Writes one balanced set of entries for a transaction, atomically.
    ///
    /// The set must satisfy `sum(debits) == sum(credits)` or the call fails with
    /// [`LedgerError::Imbalanced`] and nothing is persisted. Entries are immutable once written;
    /// corrections are new offsetting entries under a fresh call.
    async fn record_transaction(
        &self,
        transaction_id: &str,
        transaction_type: TransactionType,
        entries: &[NewLedgerEntry],
    ) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// `sum(credit) − sum(debit)` over every entry for the account.
    async fn balance_for(&self, account_type: AccountType, account_id: &str) -> Result<Money, LedgerError>;

    /// The full audit trail written for one transaction id.
    async fn entries_for(&self, transaction_id: &str) -> Result<Vec<LedgerEntry>, LedgerError>;
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Ledger entries for {transaction_id} do not balance: debits {debits}, credits {credits}")]
    Imbalanced { transaction_id: String, debits: Money, credits: Money },
    #[error("A ledger transaction must contain at least one entry")]
    EmptyTransaction,
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

/// Checks the double-entry invariant for a candidate set of entries.
pub fn check_balanced(transaction_id: &str, entries: &[NewLedgerEntry]) -> Result<(), LedgerError> {
    if entries.is_empty() {
        return Err(LedgerError::EmptyTransaction);
    }
    let debits: Money = entries.iter().map(|e| e.debit_amount).sum();
    let credits: Money = entries.iter().map(|e| e.credit_amount).sum();
    if debits == credits {
        Ok(())
    } else {
        Err(LedgerError::Imbalanced { transaction_id: transaction_id.to_string(), debits, credits })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn balanced_set_passes() {
        let entries = [
            NewLedgerEntry::debit(AccountType::Customer, "cust-1", Money::from(1000), "charge"),
            NewLedgerEntry::credit(AccountType::Seller, "seller-1", Money::from(900), "net"),
            NewLedgerEntry::credit(AccountType::Platform, "platform", Money::from(100), "commission"),
        ];
        assert!(check_balanced("tx-1", &entries).is_ok());
    }

    #[test]
    fn unbalanced_set_is_rejected() {
        let entries = [
            NewLedgerEntry::debit(AccountType::Customer, "cust-1", Money::from(1000), "charge"),
            NewLedgerEntry::credit(AccountType::Seller, "seller-1", Money::from(999), "net"),
        ];
        match check_balanced("tx-1", &entries) {
            Err(LedgerError::Imbalanced { debits, credits, .. }) => {
                assert_eq!(debits, Money::from(1000));
                assert_eq!(credits, Money::from(999));
            },
            other => panic!("expected imbalance, got {other:?}"),
        }
    }

    #[test]
    fn empty_set_is_rejected() {
        assert!(matches!(check_balanced("tx-1", &[]), Err(LedgerError::EmptyTransaction)));
    }
}
