//! # Backend contracts
//!
//! This module defines the behaviour a database backend must expose to support the payment reconciliation engine.
//!
//! * [`PaymentGatewayDatabase`] is the write side for orders. It owns the atomic units of work: applying a payment
//!   event together with its idempotency record, cancelling orders, and moving them through fulfilment.
//! * [`OrderManagement`] provides read-only queries for orders, their items, applied payment events and the audit log.
//! * [`RefundManagement`] manages the refund ledger and guarantees that approved and processed refunds never exceed
//!   the order total.
mod data_objects;
mod order_management;
mod payment_gateway_database;
mod refund_management;

pub use data_objects::{
    AppliedPaymentEvent,
    GuardDecision,
    OrderStatusChange,
    PaymentEventOutcome,
    RefundProcessed,
};
pub use order_management::OrderManagement;
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
pub use refund_management::RefundManagement;
