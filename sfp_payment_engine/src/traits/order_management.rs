use crate::{
    db_types::{AuditLogEntry, Order, OrderId, OrderItem, PaymentEvent},
    traits::PaymentGatewayError,
};

/// Read-only queries against the order store.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Fetches the order with the given public order id. If no such order exists, `None` is returned.
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// Fetches the line items for an order, in the order they were submitted.
    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError>;

    async fn fetch_payment_event(&self, provider_event_id: &str) -> Result<Option<PaymentEvent>, PaymentGatewayError>;

    async fn fetch_payment_events_for_order(&self, order_id: &OrderId)
        -> Result<Vec<PaymentEvent>, PaymentGatewayError>;

    /// Fetches the audit trail for an order, oldest entry first.
    async fn fetch_audit_log(&self, order_id: &OrderId) -> Result<Vec<AuditLogEntry>, PaymentGatewayError>;
}
