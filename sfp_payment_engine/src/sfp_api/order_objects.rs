use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{AuditLogEntry, Cents, Order, OrderId, OrderItem, OrderStatusType, PaymentEvent, Refund};

/// Everything the store knows about an order. For operators only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment_events: Vec<PaymentEvent>,
    pub audit_log: Vec<AuditLogEntry>,
}

/// The customer-facing view of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLookupResult {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub total_amount: Cents,
    pub currency: String,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderLookupResult {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self {
            order_id: order.order_id,
            status: order.status,
            total_amount: order.total_amount,
            currency: order.currency,
            items,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundSummary {
    pub order_id: OrderId,
    pub total_amount: Cents,
    pub total_refunded: Cents,
    pub refundable_amount: Cents,
    pub refunds: Vec<Refund>,
}
