use serde::{Deserialize, Serialize};

use crate::db_types::{Order, Refund};

/// Emitted once, after the transaction that moved an order to `paid` has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub provider_event_id: String,
}

impl OrderPaidEvent {
    pub fn new(order: Order, provider_event_id: String) -> Self {
        Self { order, provider_event_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
    pub reason: String,
}

impl OrderCancelledEvent {
    pub fn new<S: Into<String>>(order: Order, reason: S) -> Self {
        Self { order, reason: reason.into() }
    }
}

/// A payment attempt failed. This is a signal for operators only; the order is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailedEvent {
    pub order: Order,
    pub provider_event_id: String,
}

impl PaymentFailedEvent {
    pub fn new(order: Order, provider_event_id: String) -> Self {
        Self { order, provider_event_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundUpdatedEvent {
    pub refund: Refund,
}

impl RefundUpdatedEvent {
    pub fn new(refund: Refund) -> Self {
        Self { refund }
    }
}
