//! In-memory bookkeeping of verification attempts.
//!
//! The tracker answers "what is happening with the payment for this order right now", which the database cannot:
//! an attempt that is mid-verification has no ledger state yet, and a failed attempt leaves none behind. Entries
//! are purely advisory. The ledger is the source of truth, and every entry expires after a TTL so the map cannot
//! grow without bound.
//!
//! The map is shared across all worker threads, so lookups and updates go through a concurrent hash map rather
//! than a mutex around the whole table.
use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum TrackedStatus {
    /// The signature checked out and the gateway is being queried.
    Verifying,
    /// The gateway confirmed the payment and the ledger has been credited.
    Settled,
    /// The gateway still reports the payment as in flight. The client should poll again.
    Processing,
    /// Verification failed. The reason is safe to show to the customer.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PaymentAttempt {
    pub payment_id: String,
    pub status: TrackedStatus,
    /// How many times verification has been attempted for this payment id.
    pub attempts: u32,
    pub updated_at: DateTime<Utc>,
}

/// Tracks the most recent verification attempt per order id.
pub struct PaymentTracker {
    attempts: DashMap<String, PaymentAttempt>,
    ttl: Duration,
}

impl PaymentTracker {
    pub fn new(ttl: Duration) -> Self {
        Self { attempts: DashMap::new(), ttl }
    }

    /// Opens a verification attempt. A retry of the same payment bumps the attempt counter; a fresh payment id
    /// for the order resets it to one.
    pub fn start_attempt(&self, order_id: &str, payment_id: &str, status: TrackedStatus) {
        match self.attempts.entry(order_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let attempt = entry.get_mut();
                attempt.attempts = if attempt.payment_id == payment_id { attempt.attempts + 1 } else { 1 };
                attempt.payment_id = payment_id.to_string();
                attempt.status = status;
                attempt.updated_at = Utc::now();
            },
            Entry::Vacant(entry) => {
                entry.insert(PaymentAttempt {
                    payment_id: payment_id.to_string(),
                    status,
                    attempts: 1,
                    updated_at: Utc::now(),
                });
            },
        }
    }

    /// Records the current state of the attempt in flight without bumping the attempt counter. Used for status
    /// transitions within an attempt and for webhook-driven updates.
    pub fn record(&self, order_id: &str, payment_id: &str, status: TrackedStatus) {
        match self.attempts.entry(order_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let attempt = entry.get_mut();
                if attempt.payment_id != payment_id {
                    attempt.payment_id = payment_id.to_string();
                    attempt.attempts = 1;
                }
                attempt.status = status;
                attempt.updated_at = Utc::now();
            },
            Entry::Vacant(entry) => {
                entry.insert(PaymentAttempt {
                    payment_id: payment_id.to_string(),
                    status,
                    attempts: 1,
                    updated_at: Utc::now(),
                });
            },
        }
    }

    pub fn status_of(&self, order_id: &str) -> Option<PaymentAttempt> {
        self.attempts.get(order_id).map(|entry| entry.value().clone())
    }

    /// Drops entries older than the TTL. Called from the sweep worker.
    pub fn purge_stale(&self) {
        let cutoff = Utc::now() - self.ttl;
        let before = self.attempts.len();
        self.attempts.retain(|_, attempt| attempt.updated_at > cutoff);
        let dropped = before - self.attempts.len();
        if dropped > 0 {
            debug!("🕰️ Purged {dropped} stale verification attempts");
        }
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}
