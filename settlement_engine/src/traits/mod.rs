//! Database backend contracts for the settlement engine.
//!
//! The [`SettlementDatabase`] trait is the mutating surface: applying confirmed payments, maintaining creator
//! balances, and walking payouts through their state machine. Every method that touches more than one row does so
//! inside a single database transaction; "order marked paid" and "balance credited" are never allowed to diverge.
//!
//! The [`LedgerManagement`] trait is the read-only surface: creators, orders, subscriptions, payouts and the audit
//! trail.
mod ledger_management;
mod settlement_database;

pub use ledger_management::{LedgerError, LedgerManagement};
pub use settlement_database::{SettlementDatabase, SettlementError};
