//! # Encore settlement server
//! This module hosts the HTTP face of the settlement engine. It is responsible for:
//! * Verifying client-reported payments against the gateway (signature check + authoritative status fetch).
//! * Listening for incoming webhook requests from the payment gateway and applying them to the ledger.
//! * Serving creator balances, payout submissions and order status queries.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/orders` and `/subscriptions`: Open a gateway order for a checkout basket or a subscription.
//! * `/payments/verify`: Client-initiated payment verification.
//! * `/orders/{order_id}/status`: Current status of an order, including any in-flight verification attempt.
//! * `/payouts`: Submit a payout for a creator.
//! * `/creators/{id}/balance` and `/creators/{id}/history`: The ledger's view of a creator.
//! * `/gateway/webhook`: The gateway webhook sink, guarded by an HMAC signature check.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sweep_worker;
pub mod tracker;
pub mod webhook;

#[cfg(test)]
mod endpoint_tests;
