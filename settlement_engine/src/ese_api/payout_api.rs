use std::fmt::Debug;

use enc_common::Paise;
use log::*;

use crate::{
    db_types::{Creator, NewCreator, PayoutRecord, PayoutStatus},
    events::{EventProducers, PayoutFinalizedEvent},
    traits::{SettlementDatabase, SettlementError},
};

/// `PayoutApi` manages the payout side of the ledger: reserving funds, recording submitted transfers and walking
/// them to a terminal state as the gateway reports back.
///
/// The API deliberately does not talk to the gateway itself. The server submits the transfer first and records the
/// outcome here, so a database failure can never leave an unrecorded transfer of real money as the silent case.
pub struct PayoutApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PayoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutApi")
    }
}

impl<B> PayoutApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> PayoutApi<B>
where B: SettlementDatabase
{
    pub async fn register_creator(&self, creator: NewCreator) -> Result<i64, SettlementError> {
        self.db.insert_creator(creator).await
    }

    /// Fetches the creator and verifies that a payout of `amount` could go ahead: the creator exists, has a
    /// registered fund account (or the bank details to create one) and a sufficient balance. Called before any
    /// gateway traffic so a doomed request never leaves the process.
    pub async fn check_payout_preconditions(&self, creator_id: i64, amount: Paise) -> Result<Creator, SettlementError> {
        if !amount.is_positive() {
            return Err(SettlementError::InvalidAmount(format!("payout amount must be positive, got {amount}")));
        }
        let creator =
            self.db.fetch_creator(creator_id).await?.ok_or(SettlementError::CreatorNotFound(creator_id))?;
        if creator.available_balance < amount {
            return Err(SettlementError::InsufficientBalance {
                requested: amount,
                available: creator.available_balance,
            });
        }
        if !creator.has_fund_account() && creator.bank_account_number.is_none() {
            return Err(SettlementError::MissingFundAccount(creator_id));
        }
        Ok(creator)
    }

    /// Stores the gateway payout identifiers on the creator after first-time registration.
    pub async fn register_fund_account(
        &self,
        creator_id: i64,
        contact_id: &str,
        fund_account_id: &str,
    ) -> Result<(), SettlementError> {
        self.db.register_fund_account(creator_id, contact_id, fund_account_id).await
    }

    /// Reserves a fresh nonce for the next payout attempt. The nonce feeds the idempotency key sent to the
    /// gateway, so a network retry of one attempt reuses the key while distinct attempts never collide.
    pub async fn next_payout_nonce(&self, creator_id: i64) -> Result<i64, SettlementError> {
        self.db.next_payout_nonce(creator_id).await
    }

    pub async fn fetch_payout_by_idempotency_key(&self, key: &str) -> Result<Option<PayoutRecord>, SettlementError> {
        Ok(self.db.fetch_payout_by_idempotency_key(key).await?)
    }

    /// Records a transfer the gateway has accepted: debits the balance and stores the payout row atomically.
    pub async fn record_payout(
        &self,
        creator_id: i64,
        amount: Paise,
        idempotency_key: &str,
        transfer_id: &str,
        status: PayoutStatus,
    ) -> Result<PayoutRecord, SettlementError> {
        self.db.record_payout(creator_id, amount, idempotency_key, transfer_id, status).await
    }

    /// Applies a gateway status notification to a payout. Failed and cancelled transfers refund the creator's
    /// balance; the finalized hook fires for every terminal state, after the refund has committed.
    pub async fn finalize_payout(
        &self,
        transfer_id: &str,
        status: PayoutStatus,
    ) -> Result<PayoutRecord, SettlementError> {
        let payout = self.db.finalize_payout(transfer_id, status).await?;
        if payout.status.is_terminal() {
            self.call_payout_finalized_hook(&payout).await;
        }
        Ok(payout)
    }

    async fn call_payout_finalized_hook(&self, payout: &PayoutRecord) {
        for emitter in &self.producers.payout_finalized_producer {
            debug!("🔄️💸️ Notifying payout finalized hook subscribers");
            emitter.publish_event(PayoutFinalizedEvent::new(payout.clone())).await;
        }
    }
}
