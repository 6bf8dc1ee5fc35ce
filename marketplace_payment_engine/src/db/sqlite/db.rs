use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use mpg_common::Money;
use sqlx::SqlitePool;

use crate::{
    db::sqlite::{db_url, ledger, new_pool, payments, payouts, refunds, run_migrations, sellers, splits},
    db_types::{
        AccountType,
        BankVerificationStatus,
        KycStatus,
        LedgerEntry,
        LinkedAccountStatus,
        NewBankAccount,
        NewLedgerEntry,
        NewPayment,
        OrderId,
        OrderItem,
        Payment,
        PaymentSplit,
        PaymentStatus,
        Payout,
        PayoutStatus,
        Refund,
        SellerBankAccount,
        SellerKyc,
        SellerLinkedAccount,
        TransactionType,
    },
    splits::{compute_split, FeeRates},
    traits::{
        data_objects::{CaptureOutcome, EarningsSummary, InsertPaymentResult, PaymentAnalytics, PayoutReservation},
        LedgerError,
        LedgerManagement,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        PayoutError,
        PayoutManagement,
        SellerVerification,
        VerificationError,
    },
};

use super::SqliteDatabaseError;

/// The platform's clearing account id in the ledger.
pub const PLATFORM_ACCOUNT: &str = "platform";
/// The tax remittance account id in the ledger.
pub const TAX_ACCOUNT: &str = "tax";

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    /// Creates a connection pool for the given URL and brings the schema up to date.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        run_migrations(&pool).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn payment_transaction_id(payment: &Payment) -> String {
        format!("pay_{}", payment.id)
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_payment(
        &self,
        payment: NewPayment,
        gateway_order_id: &str,
    ) -> Result<InsertPaymentResult, PaymentGatewayError> {
        if payment.items.is_empty() {
            return Err(PaymentGatewayError::NoOrderItems);
        }
        let items_total: Money = payment.items.iter().map(|i| i.gross_amount).sum();
        if items_total != payment.amount {
            return Err(PaymentGatewayError::AmountMismatch { items_total, amount: payment.amount });
        }
        let mut tx = self.pool.begin().await?;
        if let Some(existing) = payments::fetch_payment_by_idempotency_key(&payment.idempotency_key, &mut tx).await? {
            debug!(
                "🗃️ Payment for idempotency key {} already exists with id {}. Returning it unchanged.",
                payment.idempotency_key, existing.id
            );
            return Ok(InsertPaymentResult::AlreadyExists(existing));
        }
        let id = match payments::insert_payment(&payment, gateway_order_id, &mut tx).await {
            Ok(id) => id,
            Err(e) => {
                // A concurrent create with the same key may have won the race on the unique index.
                drop(tx);
                let mut conn = self.pool.acquire().await?;
                return match payments::fetch_payment_by_idempotency_key(&payment.idempotency_key, &mut conn).await? {
                    Some(existing) => Ok(InsertPaymentResult::AlreadyExists(existing)),
                    None => Err(e.into()),
                };
            },
        };
        let inserted = payments::fetch_payment(id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PaymentNotFound(id.to_string()))?;
        tx.commit().await?;
        Ok(InsertPaymentResult::Inserted(inserted))
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment(payment_id, &mut conn).await?)
    }

    async fn fetch_payment_by_order_id(&self, order_id: &OrderId) -> Result<Option<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_by_order_id(order_id, &mut conn).await?)
    }

    async fn fetch_payment_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_by_idempotency_key(key, &mut conn).await?)
    }

    async fn fetch_payment_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment_by_gateway_order_id(gateway_order_id, &mut conn).await?)
    }

    async fn fetch_order_items(&self, payment_id: i64) -> Result<Vec<OrderItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_order_items(payment_id, &mut conn).await?)
    }

    async fn capture_payment(
        &self,
        payment_id: i64,
        gateway_payment_id: &str,
        rates: FeeRates,
        hold_period: Duration,
    ) -> Result<CaptureOutcome, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::fetch_payment(payment_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PaymentNotFound(payment_id.to_string()))?;
        if payment.status == PaymentStatus::Captured {
            let existing = splits::fetch_splits_for_payment(payment_id, &mut tx).await?;
            tx.commit().await?;
            debug!("🗃️ Payment {payment_id} is already captured. Treating capture as a no-op.");
            return Ok(CaptureOutcome { payment, splits: existing, already_captured: true });
        }
        if !payment.status.can_transition_to(PaymentStatus::Captured) {
            return Err(PaymentGatewayError::IllegalStatusChange {
                from: payment.status.to_string(),
                to: PaymentStatus::Captured.to_string(),
            });
        }
        let items = payments::fetch_order_items(payment_id, &mut tx).await?;
        if items.is_empty() {
            return Err(PaymentGatewayError::NoOrderItems);
        }
        let items_total: Money = items.iter().map(|i| i.gross_amount).sum();
        if items_total != payment.amount {
            return Err(PaymentGatewayError::AmountMismatch { items_total, amount: payment.amount });
        }

        let now = Utc::now();
        let hold_until = now + hold_period;
        let mut entries =
            vec![NewLedgerEntry::debit(AccountType::Customer, &payment.customer_id, payment.amount, "Order charge")];
        let mut commission_total = Money::zero();
        let mut tax_total = Money::zero();
        for item in &items {
            let amounts = compute_split(item.gross_amount, rates, false)?;
            splits::insert_split(
                payment_id,
                &item.order_item_id,
                &item.seller_id,
                &amounts,
                rates.commission_bp,
                rates.gst_bp,
                rates.tds_bp,
                hold_until,
                &mut tx,
            )
            .await?;
            entries.push(NewLedgerEntry::credit(
                AccountType::Seller,
                &item.seller_id,
                amounts.net_seller_amount,
                &format!("Net proceeds for item {}", item.order_item_id),
            ));
            commission_total = commission_total + amounts.commission;
            tax_total = tax_total + amounts.gst_on_commission + amounts.tds_deducted;
        }
        if commission_total.is_positive() {
            entries.push(NewLedgerEntry::credit(
                AccountType::Platform,
                PLATFORM_ACCOUNT,
                commission_total,
                "Platform commission",
            ));
        }
        if tax_total.is_positive() {
            entries.push(NewLedgerEntry::credit(AccountType::Tax, TAX_ACCOUNT, tax_total, "GST and TDS withheld"));
        }
        let tx_id = Self::payment_transaction_id(&payment);
        ledger::record_transaction(&tx_id, TransactionType::Payment, &payment.currency, &entries, &mut tx).await?;

        let rows = payments::record_capture(payment_id, payment.status, gateway_payment_id, now, &mut tx).await?;
        if rows == 0 {
            return Err(PaymentGatewayError::DatabaseError(format!(
                "Payment {payment_id} status changed concurrently during capture"
            )));
        }
        let new_splits = splits::fetch_splits_for_payment(payment_id, &mut tx).await?;
        let captured = payments::fetch_payment(payment_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PaymentNotFound(payment_id.to_string()))?;
        tx.commit().await?;
        info!(
            "🗃️ Payment {payment_id} captured: {} split(s) held until {hold_until}, ledger transaction {tx_id}",
            new_splits.len()
        );
        Ok(CaptureOutcome { payment: captured, splits: new_splits, already_captured: false })
    }

    async fn mark_payment_failed(&self, payment_id: i64, reason: &str) -> Result<Payment, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::fetch_payment(payment_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PaymentNotFound(payment_id.to_string()))?;
        if !payment.status.can_transition_to(PaymentStatus::Failed) {
            // A late failure event loses against an earlier capture or terminal state.
            debug!("🗃️ Ignoring failure for payment {payment_id} in status {}", payment.status);
            return Ok(payment);
        }
        payments::record_failure(payment_id, payment.status, reason, &mut tx).await?;
        let updated = payments::fetch_payment(payment_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PaymentNotFound(payment_id.to_string()))?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn fetch_splits_for_payment(&self, payment_id: i64) -> Result<Vec<PaymentSplit>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(splits::fetch_splits_for_payment(payment_id, &mut conn).await?)
    }

    async fn insert_refund(
        &self,
        payment_id: i64,
        amount: Money,
        reason: Option<String>,
        gateway_refund_id: &str,
    ) -> Result<Refund, PaymentGatewayError> {
        if !amount.is_positive() {
            return Err(PaymentGatewayError::InvalidAmount(format!("refund amount {amount} must be positive")));
        }
        let mut tx = self.pool.begin().await?;
        let payment = payments::fetch_payment(payment_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PaymentNotFound(payment_id.to_string()))?;
        if !matches!(payment.status, PaymentStatus::Captured | PaymentStatus::PartiallyRefunded) {
            return Err(PaymentGatewayError::IllegalStatusChange {
                from: payment.status.to_string(),
                to: "Refunded".to_string(),
            });
        }
        let refunded = refunds::refunded_total(payment_id, &mut tx).await?;
        let remaining = payment.amount - refunded;
        if amount > remaining {
            return Err(PaymentGatewayError::RefundExceedsCaptured { requested: amount, remaining });
        }
        let is_partial = amount < remaining;
        let refund = refunds::insert_refund(
            payment_id,
            &payment.order_id,
            amount,
            is_partial,
            reason.as_deref(),
            gateway_refund_id,
            &mut tx,
        )
        .await?;
        let entries = [
            NewLedgerEntry::debit(AccountType::Platform, PLATFORM_ACCOUNT, amount, "Refund disbursed"),
            NewLedgerEntry::credit(AccountType::Customer, &payment.customer_id, amount, "Refund received"),
        ];
        let tx_id = format!("refund_{}", refund.id);
        ledger::record_transaction(&tx_id, TransactionType::Refund, &payment.currency, &entries, &mut tx).await?;
        let new_status =
            if is_partial { PaymentStatus::PartiallyRefunded } else { PaymentStatus::Refunded };
        payments::set_refund_state(payment_id, new_status, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Refund {} of {amount} recorded against payment {payment_id} ({new_status})", refund.id);
        Ok(refund)
    }

    async fn refunds_for_payment(&self, payment_id: i64) -> Result<Vec<Refund>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(refunds::refunds_for_payment(payment_id, &mut conn).await?)
    }

    async fn fetch_releasable_splits(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentSplit>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(splits::fetch_releasable(now, limit, &mut conn).await?)
    }

    async fn release_split(&self, split_id: i64) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(splits::release(split_id, &mut conn).await?)
    }

    async fn payment_analytics(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PaymentAnalytics, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::payment_analytics(from, to, &mut conn).await?)
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn record_transaction(
        &self,
        transaction_id: &str,
        transaction_type: TransactionType,
        entries: &[NewLedgerEntry],
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let written =
            ledger::record_transaction(transaction_id, transaction_type, mpg_common::CURRENCY_CODE, entries, &mut tx)
                .await?;
        tx.commit().await?;
        Ok(written)
    }

    async fn balance_for(&self, account_type: AccountType, account_id: &str) -> Result<Money, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::balance_for(account_type, account_id, &mut conn).await?)
    }

    async fn entries_for(&self, transaction_id: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::entries_for(transaction_id, &mut conn).await?)
    }
}

impl PayoutManagement for SqliteDatabase {
    async fn pending_payout_balance(&self, seller_id: &str) -> Result<Money, PayoutError> {
        let mut conn = self.pool.acquire().await?;
        Ok(splits::available_balance(seller_id, &mut conn).await?)
    }

    async fn reserve_payout(
        &self,
        seller_id: &str,
        amount: Money,
        payout_ref: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<PayoutReservation, PayoutError> {
        if !amount.is_positive() {
            return Err(PayoutError::InsufficientBalance { requested: amount, available: Money::zero() });
        }
        let mut tx = self.pool.begin().await?;
        let kyc = sellers::fetch_kyc(seller_id, &mut tx).await?;
        if !matches!(kyc.map(|k| k.status), Some(KycStatus::Verified)) {
            return Err(PayoutError::KycNotVerified(seller_id.to_string()));
        }
        let bank = sellers::fetch_primary_bank_account(seller_id, &mut tx)
            .await?
            .filter(|b| b.verification_status == BankVerificationStatus::Verified)
            .ok_or_else(|| PayoutError::NoVerifiedBankAccount(seller_id.to_string()))?;
        let available = splits::available_balance(seller_id, &mut tx).await?;
        if amount > available {
            return Err(PayoutError::InsufficientBalance { requested: amount, available });
        }
        // Whole-split consumption: take the oldest released splits whose cumulative net fits
        // within the requested amount.
        let candidates = splits::fetch_available(seller_id, &mut tx).await?;
        let mut selected = Vec::new();
        let mut cumulative = Money::zero();
        for split in candidates {
            if cumulative + split.net_seller_amount > amount {
                break;
            }
            cumulative = cumulative + split.net_seller_amount;
            selected.push(split);
        }
        if selected.is_empty() {
            return Err(PayoutError::NothingToPayOut);
        }
        let payout_id =
            payouts::insert_payout(payout_ref, seller_id, cumulative, mpg_common::CURRENCY_CODE, bank.id, scheduled_at, &mut tx)
                .await?;
        let mut reserved = Money::zero();
        let mut reserved_splits = Vec::with_capacity(selected.len());
        for split in selected {
            if splits::reserve_for_payout(split.id, payout_id, &mut tx).await? {
                reserved = reserved + split.net_seller_amount;
                reserved_splits.push(split);
            }
        }
        if reserved_splits.is_empty() {
            // every candidate was claimed by a concurrent request; roll the payout back
            drop(tx);
            return Err(PayoutError::InsufficientBalance { requested: amount, available: Money::zero() });
        }
        if reserved != cumulative {
            payouts::set_amount(payout_id, reserved, &mut tx).await?;
        }
        let payout = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PayoutNotFound(payout_id.to_string()))?;
        tx.commit().await?;
        info!(
            "🗃️ Payout {payout_ref} created for seller {seller_id}: {reserved} across {} split(s)",
            reserved_splits.len()
        );
        Ok(PayoutReservation { payout, splits: reserved_splits })
    }

    async fn mark_payout_processing(
        &self,
        payout_id: i64,
        gateway_payout_id: &str,
    ) -> Result<Payout, PayoutError> {
        let mut tx = self.pool.begin().await?;
        let payout = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PayoutNotFound(payout_id.to_string()))?;
        let rows = payouts::record_processing(payout_id, gateway_payout_id, &mut tx).await?;
        if rows == 0 {
            return Err(PayoutError::IllegalStatusChange { from: payout.status, to: PayoutStatus::Processing });
        }
        let updated = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PayoutNotFound(payout_id.to_string()))?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn fail_payout(&self, payout_id: i64, reason: &str) -> Result<Payout, PayoutError> {
        let mut tx = self.pool.begin().await?;
        let payout = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PayoutNotFound(payout_id.to_string()))?;
        if payout.status == PayoutStatus::Failed {
            debug!("🗃️ Payout {payout_id} is already failed. No action to take.");
            return Ok(payout);
        }
        let rows = payouts::record_failure(payout_id, reason, &mut tx).await?;
        if rows == 0 {
            return Err(PayoutError::IllegalStatusChange { from: payout.status, to: PayoutStatus::Failed });
        }
        let released = splits::release_reservations(payout_id, &mut tx).await?;
        let updated = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PayoutNotFound(payout_id.to_string()))?;
        tx.commit().await?;
        info!("🗃️ Payout {payout_id} failed ({reason}); {released} split(s) returned to the available pool");
        Ok(updated)
    }

    async fn cancel_payout(&self, payout_id: i64) -> Result<Payout, PayoutError> {
        let mut tx = self.pool.begin().await?;
        let payout = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PayoutNotFound(payout_id.to_string()))?;
        if payout.status == PayoutStatus::Cancelled {
            return Ok(payout);
        }
        let rows = payouts::update_status_cas(payout_id, PayoutStatus::Pending, PayoutStatus::Cancelled, &mut tx).await?;
        if rows == 0 {
            return Err(PayoutError::IllegalStatusChange { from: payout.status, to: PayoutStatus::Cancelled });
        }
        splits::release_reservations(payout_id, &mut tx).await?;
        let updated = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PayoutNotFound(payout_id.to_string()))?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn complete_payout(
        &self,
        payout_id: i64,
        gateway_payout_id: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<Payout, PayoutError> {
        let mut tx = self.pool.begin().await?;
        let payout = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PayoutNotFound(payout_id.to_string()))?;
        if payout.status == PayoutStatus::Completed {
            debug!("🗃️ Payout {payout_id} is already completed. Replay ignored.");
            return Ok(payout);
        }
        let rows = payouts::record_completion(payout_id, gateway_payout_id, processed_at, &mut tx).await?;
        if rows == 0 {
            return Err(PayoutError::IllegalStatusChange { from: payout.status, to: PayoutStatus::Completed });
        }
        splits::mark_paid(payout_id, &mut tx).await?;
        let entries = [
            NewLedgerEntry::debit(AccountType::Seller, &payout.seller_id, payout.amount, "Payout disbursed"),
            NewLedgerEntry::credit(AccountType::Platform, PLATFORM_ACCOUNT, payout.amount, "Payout clearing"),
        ];
        let tx_id = format!("payout_{}", payout.payout_ref);
        ledger::record_transaction(&tx_id, TransactionType::Payout, &payout.currency, &entries, &mut tx).await?;
        let updated = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PayoutNotFound(payout_id.to_string()))?;
        tx.commit().await?;
        info!("🗃️ Payout {payout_id} completed; splits are now terminally paid");
        Ok(updated)
    }

    async fn reverse_payout(&self, payout_id: i64, reason: &str) -> Result<Payout, PayoutError> {
        let mut tx = self.pool.begin().await?;
        let payout = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PayoutNotFound(payout_id.to_string()))?;
        match payout.status {
            PayoutStatus::Failed | PayoutStatus::Cancelled => {
                debug!("🗃️ Payout {payout_id} already terminal ({}); reversal is a no-op", payout.status);
                return Ok(payout);
            },
            PayoutStatus::Completed => {
                payouts::record_reversal(payout_id, reason, &mut tx).await?;
                splits::unpay(payout_id, &mut tx).await?;
                // undo the disbursal posting with an exact offsetting pair
                let entries = [
                    NewLedgerEntry::credit(AccountType::Seller, &payout.seller_id, payout.amount, "Payout reversed"),
                    NewLedgerEntry::debit(
                        AccountType::Platform,
                        PLATFORM_ACCOUNT,
                        payout.amount,
                        "Payout clearing reversed",
                    ),
                ];
                let tx_id = format!("payout_reversal_{}", payout.payout_ref);
                ledger::record_transaction(&tx_id, TransactionType::PayoutReversal, &payout.currency, &entries, &mut tx)
                    .await?;
            },
            PayoutStatus::Pending | PayoutStatus::Processing => {
                payouts::record_failure(payout_id, reason, &mut tx).await?;
                splits::release_reservations(payout_id, &mut tx).await?;
            },
        }
        let updated = payouts::fetch_payout(payout_id, &mut tx)
            .await?
            .ok_or_else(|| SqliteDatabaseError::PayoutNotFound(payout_id.to_string()))?;
        tx.commit().await?;
        info!("🗃️ Payout {payout_id} reversed ({reason})");
        Ok(updated)
    }

    async fn fetch_payout(&self, payout_id: i64) -> Result<Option<Payout>, PayoutError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_payout(payout_id, &mut conn).await?)
    }

    async fn fetch_payout_by_ref(&self, payout_ref: &str) -> Result<Option<Payout>, PayoutError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_payout_by_ref(payout_ref, &mut conn).await?)
    }

    async fn fetch_payouts_for_seller(&self, seller_id: &str) -> Result<Vec<Payout>, PayoutError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_payouts_for_seller(seller_id, &mut conn).await?)
    }

    async fn fetch_due_payouts(&self, now: DateTime<Utc>) -> Result<Vec<Payout>, PayoutError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payouts::fetch_due_payouts(now, &mut conn).await?)
    }

    async fn earnings_summary(&self, seller_id: &str) -> Result<EarningsSummary, PayoutError> {
        let mut conn = self.pool.acquire().await?;
        let totals = splits::seller_totals(seller_id, &mut conn).await?;
        let ledger_balance = ledger::balance_for(AccountType::Seller, seller_id, &mut conn)
            .await
            .map_err(|e| PayoutError::DatabaseError(e.to_string()))?;
        Ok(EarningsSummary {
            seller_id: seller_id.to_string(),
            total_earned: totals.total_earned,
            on_hold: totals.on_hold,
            available: totals.available,
            reserved: totals.reserved,
            paid_out: totals.paid_out,
            ledger_balance,
        })
    }
}

impl SellerVerification for SqliteDatabase {
    async fn upsert_kyc(
        &self,
        seller_id: &str,
        legal_name: &str,
        pan_number: &str,
    ) -> Result<SellerKyc, VerificationError> {
        let mut conn = self.pool.acquire().await?;
        Ok(sellers::upsert_kyc(seller_id, legal_name, pan_number, &mut conn).await?)
    }

    async fn set_kyc_status(&self, seller_id: &str, status: KycStatus) -> Result<SellerKyc, VerificationError> {
        let mut conn = self.pool.acquire().await?;
        sellers::set_kyc_status(seller_id, status, &mut conn)
            .await?
            .ok_or_else(|| VerificationError::NotFound(seller_id.to_string()))
    }

    async fn fetch_kyc(&self, seller_id: &str) -> Result<Option<SellerKyc>, VerificationError> {
        let mut conn = self.pool.acquire().await?;
        Ok(sellers::fetch_kyc(seller_id, &mut conn).await?)
    }

    async fn add_bank_account(&self, account: NewBankAccount) -> Result<SellerBankAccount, VerificationError> {
        let mut tx = self.pool.begin().await?;
        let inserted = sellers::insert_bank_account(&account, &mut tx).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn set_bank_verification(
        &self,
        account_id: i64,
        status: BankVerificationStatus,
    ) -> Result<SellerBankAccount, VerificationError> {
        let mut conn = self.pool.acquire().await?;
        sellers::set_bank_verification(account_id, status, &mut conn)
            .await?
            .ok_or(VerificationError::BankAccountNotFound(account_id))
    }

    async fn fetch_primary_bank_account(
        &self,
        seller_id: &str,
    ) -> Result<Option<SellerBankAccount>, VerificationError> {
        let mut conn = self.pool.acquire().await?;
        Ok(sellers::fetch_primary_bank_account(seller_id, &mut conn).await?)
    }

    async fn upsert_linked_account(
        &self,
        seller_id: &str,
        gateway_account_id: &str,
    ) -> Result<SellerLinkedAccount, VerificationError> {
        let mut conn = self.pool.acquire().await?;
        Ok(sellers::upsert_linked_account(seller_id, gateway_account_id, &mut conn).await?)
    }

    async fn set_linked_account_status(
        &self,
        seller_id: &str,
        status: LinkedAccountStatus,
    ) -> Result<SellerLinkedAccount, VerificationError> {
        let mut tx = self.pool.begin().await?;
        let current = sellers::fetch_linked_account(seller_id, &mut tx)
            .await?
            .ok_or_else(|| VerificationError::NotFound(seller_id.to_string()))?;
        if current.status == status {
            return Ok(current);
        }
        if !current.status.can_transition_to(status) {
            return Err(VerificationError::IllegalStatusChange { from: current.status, to: status });
        }
        let updated = sellers::set_linked_account_status(seller_id, status, &mut tx)
            .await?
            .ok_or_else(|| VerificationError::NotFound(seller_id.to_string()))?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn fetch_linked_account(
        &self,
        seller_id: &str,
    ) -> Result<Option<SellerLinkedAccount>, VerificationError> {
        let mut conn = self.pool.acquire().await?;
        Ok(sellers::fetch_linked_account(seller_id, &mut conn).await?)
    }
}
