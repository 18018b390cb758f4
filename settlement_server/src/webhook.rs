//! Gateway webhook handling.
//!
//! The HMAC middleware has already authenticated the body by the time anything here runs. This module is about the
//! other two webhook problems: the gateway delivers events at least once (so everything must dedup), and it
//! delivers them in no particular order (so every handler tolerates hearing about things it already knows).
//!
//! Every event is acknowledged with a 200 unless the body is unreadable. A non-2xx answer makes the gateway
//! redeliver, which is only useful for transient failures; those return 500 so the redelivery can succeed later.
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::*;
use razorpay_tools::{PayoutState, RazorpayPayment, RazorpayPayout};
use serde::Deserialize;
use settlement_engine::{
    db_types::{OrderId, PayoutStatus},
    PayoutApi,
    SettlementApi,
    SettlementDatabase,
    SettlementError,
};

use crate::tracker::{PaymentTracker, TrackedStatus};

//--------------------------------------  Event deduplication  -------------------------------------------------------

/// Remembers which webhook event ids have already been applied, so a redelivery is acknowledged without touching
/// the ledger again. The set is bounded: when full, the oldest entries are evicted first.
///
/// This is an in-process set, which is sufficient for a single-instance deployment; the database-level guards
/// (status transitions, unique idempotency keys) remain the hard backstop behind it.
pub struct ProcessedEvents {
    seen: DashMap<String, DateTime<Utc>>,
    capacity: usize,
}

impl ProcessedEvents {
    pub fn new(capacity: usize) -> Self {
        Self { seen: DashMap::new(), capacity }
    }

    /// Marks an event as being processed. Returns `false` if the event was already seen, in which case the caller
    /// should acknowledge without re-applying. The mark happens eagerly, before the handler runs, so a concurrent
    /// redelivery of the same event cannot slip past while the first delivery is mid-flight.
    pub fn mark(&self, event_id: &str) -> bool {
        if self.seen.len() >= self.capacity {
            self.evict_oldest();
        }
        self.seen.insert(event_id.to_string(), Utc::now()).is_none()
    }

    /// Removes an eagerly added mark after a handler failed, so the gateway's redelivery gets another chance.
    pub fn unmark(&self, event_id: &str) {
        self.seen.remove(event_id);
    }

    fn evict_oldest(&self) {
        if let Some(oldest) = self.seen.iter().min_by_key(|e| *e.value()).map(|e| e.key().clone()) {
            self.seen.remove(&oldest);
            trace!("📬️ Dedup set full. Evicted oldest event id {oldest}");
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

//--------------------------------------    Payload types    ---------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    /// The gateway's event id, when the body carries one. The delivery header takes precedence over this.
    #[serde(default)]
    pub id: Option<String>,
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<Wrapped<RazorpayPayment>>,
    #[serde(default)]
    pub payout: Option<Wrapped<RazorpayPayout>>,
    #[serde(default)]
    pub subscription: Option<Wrapped<SubscriptionEntity>>,
}

/// The gateway nests every entity one level down: `{"payment": {"entity": {...}}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Wrapped<T> {
    pub entity: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionEntity {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl WebhookEnvelope {
    /// The deduplication key this body yields: the event id the gateway put in the body, or, for deliveries that
    /// carried no id at all, the event name plus the id of whichever entity it is about.
    pub fn event_id(&self) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }
        let entity_id = self
            .payload
            .payment
            .as_ref()
            .map(|p| p.entity.id.as_str())
            .or_else(|| self.payload.payout.as_ref().map(|p| p.entity.id.as_str()))
            .or_else(|| self.payload.subscription.as_ref().map(|s| s.entity.id.as_str()))
            .unwrap_or("unknown");
        format!("{}:{entity_id}", self.event)
    }
}

fn payout_status_from(state: PayoutState) -> PayoutStatus {
    match state {
        PayoutState::Pending | PayoutState::Queued | PayoutState::Processing => PayoutStatus::Processing,
        PayoutState::Processed => PayoutStatus::Processed,
        PayoutState::Cancelled => PayoutStatus::Cancelled,
        PayoutState::Reversed | PayoutState::Rejected | PayoutState::Failed => PayoutStatus::Failed,
    }
}

//--------------------------------------      Dispatcher     ---------------------------------------------------------

/// The outcome the route layer turns into an HTTP status. `Transient` asks the gateway to redeliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Applied,
    AlreadyApplied,
    Ignored,
    Transient(String),
}

/// Applies one authenticated webhook event to the ledger. Redeliveries and out-of-order terminal notifications
/// come back as `AlreadyApplied`; unknown event types are logged and `Ignored`.
pub async fn dispatch_event<B: SettlementDatabase>(
    envelope: &WebhookEnvelope,
    settlements: &SettlementApi<B>,
    payouts: &PayoutApi<B>,
    tracker: &PaymentTracker,
) -> DispatchOutcome {
    match envelope.event.as_str() {
        "payment.captured" | "payment.authorized" => match &envelope.payload.payment {
            Some(p) => settle_payment(&p.entity, settlements, tracker).await,
            None => malformed(&envelope.event),
        },
        "payment.failed" => match &envelope.payload.payment {
            Some(p) => {
                let reason = p.entity.error_description.as_deref();
                settlements.payment_failed(&OrderId::from(p.entity.order_id.clone()), &p.entity.id, reason).await;
                tracker.record(
                    &p.entity.order_id,
                    &p.entity.id,
                    TrackedStatus::Failed(reason.unwrap_or("Payment failed").to_string()),
                );
                DispatchOutcome::Applied
            },
            None => malformed(&envelope.event),
        },
        "payout.processed" | "payout.failed" | "payout.reversed" | "payout.rejected" | "payout.cancelled" => {
            match &envelope.payload.payout {
                Some(p) => finalize_payout(&p.entity, payouts).await,
                None => malformed(&envelope.event),
            }
        },
        // Activation itself is driven by the payment capture, which carries the order id the credit is keyed on.
        // Acting on this notice instead would mark the subscription active before any money is confirmed.
        "subscription.activated" => {
            debug!("📬️ Subscription activation notice acknowledged. Activation follows the payment capture.");
            DispatchOutcome::Ignored
        },
        "subscription.cancelled" => match &envelope.payload.subscription {
            Some(s) => match settlements.cancel_subscription(&s.entity.id).await {
                Ok(_) => DispatchOutcome::Applied,
                Err(SettlementError::SubscriptionNotFound(id)) => {
                    warn!("📬️ Cancellation for unknown subscription [{id}]. Acknowledging anyway.");
                    DispatchOutcome::Ignored
                },
                Err(e) => DispatchOutcome::Transient(e.to_string()),
            },
            None => malformed(&envelope.event),
        },
        other => {
            debug!("📬️ Ignoring webhook event type '{other}'");
            DispatchOutcome::Ignored
        },
    }
}

async fn settle_payment<B: SettlementDatabase>(
    payment: &RazorpayPayment,
    settlements: &SettlementApi<B>,
    tracker: &PaymentTracker,
) -> DispatchOutcome {
    if !payment.status.is_settled() {
        warn!(
            "📬️ Payment {} arrived on a capture event but reports status '{}'. Not settling.",
            payment.id, payment.status
        );
        return DispatchOutcome::Ignored;
    }
    let order_id = OrderId::from(payment.order_id.clone());
    match settlements.confirm_payment(&order_id, &payment.id).await {
        Ok(_) => {
            tracker.record(&payment.order_id, &payment.id, TrackedStatus::Settled);
            DispatchOutcome::Applied
        },
        // The client verification flow or an earlier delivery beat us to it. That is the happy path.
        Err(SettlementError::OrderAlreadySettled(_)) | Err(SettlementError::SubscriptionAlreadyActive(_)) => {
            DispatchOutcome::AlreadyApplied
        },
        Err(SettlementError::NothingToSettle(oid)) => {
            warn!("📬️ Payment {} captured for unknown order {oid}. Acknowledging; nothing to settle.", payment.id);
            DispatchOutcome::Ignored
        },
        Err(e) => {
            error!("📬️ Could not settle order [{order_id}]: {e}");
            DispatchOutcome::Transient(e.to_string())
        },
    }
}

async fn finalize_payout<B: SettlementDatabase>(payout: &RazorpayPayout, payouts: &PayoutApi<B>) -> DispatchOutcome {
    let status = payout_status_from(payout.status);
    if !status.is_terminal() {
        debug!("📬️ Payout {} moved to non-terminal state {status}. Nothing to record.", payout.id);
        return DispatchOutcome::Ignored;
    }
    match payouts.finalize_payout(&payout.id, status).await {
        Ok(record) => {
            info!("📬️ Payout {} finalized as {}", record.id, record.status);
            DispatchOutcome::Applied
        },
        Err(SettlementError::PayoutAlreadyFinal(s)) => {
            debug!("📬️ Payout {} was already {s}. Acknowledging redelivery.", payout.id);
            DispatchOutcome::AlreadyApplied
        },
        Err(SettlementError::PayoutNotFound(id)) => {
            warn!("📬️ Terminal notification for unknown transfer {id}. Acknowledging anyway.");
            DispatchOutcome::Ignored
        },
        Err(e) => {
            error!("📬️ Could not finalize payout {}: {e}", payout.id);
            DispatchOutcome::Transient(e.to_string())
        },
    }
}

fn malformed(event: &str) -> DispatchOutcome {
    warn!("📬️ Webhook event '{event}' is missing its entity payload. Ignoring.");
    DispatchOutcome::Ignored
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn envelope_parses_nested_entities() {
        let json = r#"{
            "event": "payment.captured",
            "payload": { "payment": { "entity": {
                "id": "pay_123", "order_id": "order_456", "status": "captured", "amount": 50000
            }}}
        }"#;
        let envelope: WebhookEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.event, "payment.captured");
        let payment = &envelope.payload.payment.as_ref().unwrap().entity;
        assert_eq!(payment.order_id, "order_456");
        assert_eq!(envelope.event_id(), "payment.captured:pay_123");
    }

    #[test]
    fn a_body_carried_event_id_wins_over_the_synthetic_key() {
        let json = r#"{
            "id": "evt_AbC123",
            "event": "payment.captured",
            "payload": { "payment": { "entity": {
                "id": "pay_123", "order_id": "order_456", "status": "captured", "amount": 50000
            }}}
        }"#;
        let envelope: WebhookEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.event_id(), "evt_AbC123");
    }

    #[test]
    fn unknown_events_still_parse() {
        let envelope: WebhookEnvelope = serde_json::from_str(r#"{"event": "invoice.paid"}"#).unwrap();
        assert_eq!(envelope.event_id(), "invoice.paid:unknown");
    }

    #[test]
    fn dedup_set_rejects_replays_and_honours_unmark() {
        let set = ProcessedEvents::new(100);
        assert!(set.mark("evt_1"));
        assert!(!set.mark("evt_1"));
        set.unmark("evt_1");
        assert!(set.mark("evt_1"));
    }

    #[test]
    fn dedup_set_is_bounded() {
        let set = ProcessedEvents::new(5);
        for i in 0..20 {
            assert!(set.mark(&format!("evt_{i}")));
        }
        assert!(set.len() <= 5);
    }

    #[test]
    fn gateway_payout_states_collapse_to_ledger_states() {
        assert_eq!(payout_status_from(PayoutState::Reversed), PayoutStatus::Failed);
        assert_eq!(payout_status_from(PayoutState::Rejected), PayoutStatus::Failed);
        assert_eq!(payout_status_from(PayoutState::Processed), PayoutStatus::Processed);
        assert_eq!(payout_status_from(PayoutState::Queued), PayoutStatus::Processing);
        assert!(!payout_status_from(PayoutState::Queued).is_terminal());
    }
}
