//! Storefront Payment Engine
//!
//! The payment engine is the reconciliation core of the storefront. It receives parsed, authenticated payment events
//! from a payment provider, treats them as at-least-once, possibly out-of-order deliveries, and updates the order
//! record exactly once per logical event. It also keeps the refund ledger consistent with the original charge.
//! This library is provider-agnostic: authenticating and parsing webhooks is the job of the server.
//!
//! The library is divided into these sections:
//! 1. Data types ([`mod@db_types`]) and the pure order state machine ([`mod@order_state_machine`]).
//! 2. Backend contracts ([`mod@traits`]) and the SQLite backend ([`SqliteDatabase`]). You should never need to access
//!    the database directly. Instead, use the public API provided by the payment engine.
//! 3. The public API: [`OrderFlowApi`], [`RefundApi`] and [`OrderTrackingApi`].
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted after the change they
//! describe has been committed. For example, when a payment event moves an order to `paid`, an `OrderPaidEvent` is
//! emitted. A simple Actor framework is used so that you can easily hook into these events and perform custom actions,
//! such as sending notifications.
pub mod db_types;
pub mod events;
pub mod order_state_machine;
mod sfp_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use sfp_api::{order_flow_api::OrderFlowApi, order_objects, order_tracking_api::OrderTrackingApi, refund_api::RefundApi};
pub use traits::{
    GuardDecision,
    OrderManagement,
    PaymentEventOutcome,
    PaymentGatewayDatabase,
    PaymentGatewayError,
    RefundManagement,
};
