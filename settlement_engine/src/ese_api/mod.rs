//! The public API surface of the settlement engine. The server talks to these objects, never to the database
//! modules directly.
mod ledger_api;
mod payout_api;
mod settlement_api;

pub use ledger_api::LedgerApi;
pub use payout_api::PayoutApi;
pub use settlement_api::SettlementApi;
