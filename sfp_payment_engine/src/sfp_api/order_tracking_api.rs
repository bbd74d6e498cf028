use std::fmt::Debug;

use log::*;

use crate::{
    db_types::OrderId,
    sfp_api::order_objects::{OrderDetails, OrderLookupResult},
    traits::{OrderManagement, PaymentGatewayError},
};

/// Read access to orders.
pub struct OrderTrackingApi<B> {
    db: B,
}

impl<B> Debug for OrderTrackingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderTrackingApi")
    }
}

impl<B> OrderTrackingApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrderTrackingApi<B>
where B: OrderManagement
{
    /// Customer-facing order lookup.
    ///
    /// The order is only returned when `email` matches the email on the order (ignoring case and surrounding
    /// whitespace). An unknown order and a mismatched email are indistinguishable to the caller.
    pub async fn lookup_order(
        &self,
        order_id: &OrderId,
        email: &str,
    ) -> Result<Option<OrderLookupResult>, PaymentGatewayError> {
        let Some(order) = self.db.fetch_order_by_order_id(order_id).await? else {
            debug!("🔎️ Lookup for unknown order {order_id}");
            return Ok(None);
        };
        if !order.customer_email.trim().eq_ignore_ascii_case(email.trim()) {
            debug!("🔎️ Lookup for order {order_id} with a mismatched email");
            return Ok(None);
        }
        let items = self.db.fetch_order_items(order_id).await?;
        Ok(Some(OrderLookupResult::new(order, items)))
    }

    /// The full operator view of an order, including its payment events and audit trail.
    pub async fn order_details(&self, order_id: &OrderId) -> Result<Option<OrderDetails>, PaymentGatewayError> {
        let Some(order) = self.db.fetch_order_by_order_id(order_id).await? else {
            return Ok(None);
        };
        let items = self.db.fetch_order_items(order_id).await?;
        let payment_events = self.db.fetch_payment_events_for_order(order_id).await?;
        let audit_log = self.db.fetch_audit_log(order_id).await?;
        Ok(Some(OrderDetails { order, items, payment_events, audit_log }))
    }
}
