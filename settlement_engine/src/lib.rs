//! Encore Settlement Engine
//!
//! The settlement engine turns confirmed gateway payments into durable ledger state: order status, creator balances
//! and payout records, exactly once. It is provider-agnostic: everything that talks to the payment gateway lives in
//! `razorpay_tools`; this crate owns what happens after the money is confirmed.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    access the database directly; use the public API instead. The exception is the data types used in the
//!    database, which are defined in the `db_types` module and are public.
//! 2. The settlement public API ([`mod@ese_api`]): [`SettlementApi`] applies confirmed payments (mark paid + credit
//!    balances in one transaction), [`PayoutApi`] manages the payout ledger, and [`LedgerApi`] answers queries.
//!    Backends implement the traits in [`mod@traits`] to plug in.
//! 3. The revenue split calculator ([`mod@revenue`]), the pure arithmetic that divides a gross sale between the
//!    platform and the creator.
//!
//! The engine also emits events when orders settle or payouts reach a terminal state. A simple actor framework lets
//! downstream collaborators (notifications, fulfilment) hook into these without the engine knowing about them.
mod ese_api;
mod traits;

pub mod db_types;
pub mod events;
pub mod revenue;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use ese_api::{LedgerApi, PayoutApi, SettlementApi};
pub use traits::{LedgerError, LedgerManagement, SettlementDatabase, SettlementError};
