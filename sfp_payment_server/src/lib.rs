//! # Storefront payment server
//! This crate hosts the HTTP front end of the storefront payment engine. It is responsible for:
//! * Authenticating payment provider webhooks (HMAC signature, timestamp tolerance, optional IP whitelist).
//! * Converting provider event envelopes into engine payment events and acknowledging them so that the provider only
//!   retries deliveries that could not be committed.
//! * Exposing the refund and order administration API, and the customer-facing order lookup.
//! * Sending notifications to customers and the operations inbox when orders change.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/provider/webhook`: Signed payment events from the payment provider.
//! * `/order/lookup`: Customer order lookup by order id and email address.
//! * `/api/orders`, `/api/refunds`: Order and refund administration.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod notifications;
pub mod provider_events;
pub mod provider_routes;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
