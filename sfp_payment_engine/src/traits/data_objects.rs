use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderId, OrderStatusType, PaymentEvent, Refund},
    order_state_machine::Transition,
};

/// The idempotency guard's verdict for an inbound provider event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardDecision {
    /// The event has not been applied and the target order exists.
    Proceed,
    /// A payment event record already exists for this provider event id.
    AlreadyProcessed,
    /// The event refers to an order this store does not know about.
    OrderNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPaymentEvent {
    pub event: PaymentEvent,
    /// The order as it was persisted at the end of the transaction.
    pub order: Order,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEventOutcome {
    Applied(AppliedPaymentEvent),
    AlreadyProcessed(String),
    OrderNotFound(OrderId),
}

impl PaymentEventOutcome {
    pub fn transition(&self) -> Option<Transition> {
        match self {
            Self::Applied(a) => Some(a.transition),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChange {
    pub from: OrderStatusType,
    pub to: OrderStatusType,
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundProcessed {
    pub refund: Refund,
    /// Set when this refund completed a full refund of a paid order, which cancels the order.
    pub order_change: Option<OrderStatusChange>,
}
