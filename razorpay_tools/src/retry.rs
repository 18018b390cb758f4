//! Bounded exponential backoff around outbound gateway calls.
//!
//! Every gateway call in the engine goes through [`execute`]: each attempt is raced against a hard deadline, a
//! timeout counts as a retryable failure, and errors classified as non-retryable by
//! [`RazorpayApiError::is_retryable`] are surfaced on the first attempt. The policy is a plain value object so the
//! backoff arithmetic can be tested without any I/O.

use std::{future::Future, time::Duration};

use log::*;

use crate::RazorpayApiError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the initial attempt, so `max_retries = 3` means up to 4 calls in total.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay: Duration::from_secs(1), multiplier: 2, cap: Duration::from_secs(10) }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// The delay before retry number `attempt` (zero-based): `min(base × multiplier^attempt, cap)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.cap)
    }

    /// Worst-case total sleep time before the final attempt is made.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_retries).map(|i| self.delay_for(i)).sum()
    }
}

/// Hard deadlines for the individual gateway calls. A timeout abandons the in-flight call from the caller's
/// perspective; the transport may still complete server-side, which is why payouts carry idempotency keys.
pub mod deadlines {
    use std::time::Duration;

    pub const ORDER_CREATE: Duration = Duration::from_secs(30);
    pub const PAYMENT_FETCH: Duration = Duration::from_secs(15);
    pub const PAYMENT_VERIFY: Duration = Duration::from_secs(45);
    pub const PAYOUT_CREATE: Duration = Duration::from_secs(30);
}

/// Run `op` under the given policy, racing each attempt against `deadline`.
pub async fn execute<T, F, Fut>(
    policy: RetryPolicy,
    name: &str,
    deadline: Duration,
    mut op: F,
) -> Result<T, RazorpayApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RazorpayApiError>>,
{
    let mut attempt = 0u32;
    loop {
        let result = match tokio::time::timeout(deadline, op()).await {
            Ok(result) => result,
            Err(_) => Err(RazorpayApiError::Timeout { name: name.to_string(), seconds: deadline.as_secs() }),
        };
        match result {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => {
                warn!("💳️ '{name}' failed with a non-retryable error: {e}");
                return Err(e);
            },
            Err(e) if attempt >= policy.max_retries => {
                warn!("💳️ '{name}' failed after {} attempts: {e}", attempt + 1);
                return Err(e);
            },
            Err(e) => {
                let delay = policy.delay_for(attempt);
                debug!("💳️ '{name}' attempt {} failed ({e}). Retrying in {delay:?}", attempt + 1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
        }
    }
}
