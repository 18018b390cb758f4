use std::env;

use chrono::Duration;
use log::*;
use razorpay_tools::RazorpayConfig;

const DEFAULT_ENC_HOST: &str = "127.0.0.1";
const DEFAULT_ENC_PORT: u16 = 8340;
const DEFAULT_UNPAID_ORDER_TIMEOUT_HOURS: i64 = 48;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 1800;
const DEFAULT_TRACKER_TTL_SECS: i64 = 3600;
/// Upper bound on the number of webhook event ids remembered for deduplication.
const DEFAULT_PROCESSED_EVENTS_CAPACITY: usize = 10_000;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Gateway credentials and endpoints.
    pub razorpay: RazorpayConfig,
    /// If false, webhook HMAC signatures are not verified. **DANGER**: only for local testing.
    pub webhook_signature_checks: bool,
    /// The time before an unpaid order is considered expired and marked as such.
    pub unpaid_order_timeout: Duration,
    /// How often the sweep worker runs (order expiry, tracker purge, dedup purge).
    pub sweep_interval: std::time::Duration,
    /// How long a finished verification attempt remains queryable through the status endpoint.
    pub tracker_ttl: Duration,
    pub processed_events_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_ENC_HOST.to_string(),
            port: DEFAULT_ENC_PORT,
            database_url: String::default(),
            razorpay: RazorpayConfig::default(),
            webhook_signature_checks: true,
            unpaid_order_timeout: Duration::hours(DEFAULT_UNPAID_ORDER_TIMEOUT_HOURS),
            sweep_interval: std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            tracker_ttl: Duration::seconds(DEFAULT_TRACKER_TTL_SECS),
            processed_events_capacity: DEFAULT_PROCESSED_EVENTS_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("ENC_HOST").ok().unwrap_or_else(|| DEFAULT_ENC_HOST.into());
        let port = env::var("ENC_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for ENC_PORT. {e} Using the default, {DEFAULT_ENC_PORT}, instead."
                    );
                    DEFAULT_ENC_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_ENC_PORT);
        let database_url = env::var("ENC_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ ENC_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let razorpay = RazorpayConfig::new_from_env_or_default();
        let webhook_signature_checks =
            enc_common::helpers::parse_boolean_flag(env::var("ENC_WEBHOOK_SIGNATURE_CHECKS").ok(), true);
        if !webhook_signature_checks {
            warn!(
                "🪛️ Webhook signature checks are DISABLED. Anyone who can reach this server can forge settlement \
                 events. Never run like this in production."
            );
        }
        let unpaid_order_timeout =
            env_duration_hours("ENC_UNPAID_ORDER_TIMEOUT", Duration::hours(DEFAULT_UNPAID_ORDER_TIMEOUT_HOURS));
        let sweep_interval = env::var("ENC_SWEEP_INTERVAL")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(std::time::Duration::from_secs)
            .unwrap_or_else(|| std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS));
        let tracker_ttl = env::var("ENC_TRACKER_TTL")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Duration::seconds)
            .unwrap_or_else(|| Duration::seconds(DEFAULT_TRACKER_TTL_SECS));
        Self {
            host,
            port,
            database_url,
            razorpay,
            webhook_signature_checks,
            unpaid_order_timeout,
            sweep_interval,
            tracker_ttl,
            processed_events_capacity: DEFAULT_PROCESSED_EVENTS_CAPACITY,
        }
    }
}

fn env_duration_hours(var: &str, default: Duration) -> Duration {
    match env::var(var) {
        Ok(s) => match s.parse::<i64>() {
            Ok(hours) => Duration::hours(hours),
            Err(e) => {
                error!("🪛️ {s} is not a valid number of hours for {var}. {e}. Using the default instead.");
                default
            },
        },
        Err(_) => default,
    }
}
