use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Cents, NewRefund, OrderId, Refund},
    events::{EventProducers, OrderCancelledEvent, RefundUpdatedEvent},
    sfp_api::order_objects::RefundSummary,
    traits::{PaymentGatewayError, RefundManagement, RefundProcessed},
};

/// `RefundApi` manages refund requests against paid orders.
///
/// The sum of approved and processed refunds for an order can never exceed the order total. The backend enforces this
/// at creation, approval and processing time.
pub struct RefundApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for RefundApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundApi")
    }
}

impl<B> RefundApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> RefundApi<B>
where B: RefundManagement
{
    pub async fn create_refund(&self, refund: NewRefund) -> Result<Refund, PaymentGatewayError> {
        let refund = self.db.create_refund(refund).await.map_err(|e| {
            warn!("💸️ Refund request rejected. {e}");
            e
        })?;
        info!("💸️ Refund #{} of {} requested for order {}", refund.id, refund.amount, refund.order_id);
        self.producers.publish_refund_updated(RefundUpdatedEvent::new(refund.clone()));
        Ok(refund)
    }

    pub async fn approve_refund(&self, refund_id: i64) -> Result<Refund, PaymentGatewayError> {
        let refund = self.db.approve_refund(refund_id).await?;
        info!("💸️ Refund #{refund_id} approved for order {}", refund.order_id);
        self.producers.publish_refund_updated(RefundUpdatedEvent::new(refund.clone()));
        Ok(refund)
    }

    pub async fn decline_refund(&self, refund_id: i64) -> Result<Refund, PaymentGatewayError> {
        let refund = self.db.decline_refund(refund_id).await?;
        info!("💸️ Refund #{refund_id} declined for order {}", refund.order_id);
        self.producers.publish_refund_updated(RefundUpdatedEvent::new(refund.clone()));
        Ok(refund)
    }

    pub async fn process_refund(&self, refund_id: i64) -> Result<RefundProcessed, PaymentGatewayError> {
        let result = self.db.process_refund(refund_id).await?;
        info!("💸️ Refund #{refund_id} processed for order {}", result.refund.order_id);
        self.producers.publish_refund_updated(RefundUpdatedEvent::new(result.refund.clone()));
        if let Some(change) = &result.order_change {
            info!("💸️ Order {} was refunded in full and is now {}", change.order.order_id, change.to);
            let event = OrderCancelledEvent::new(change.order.clone(), "Refunded in full");
            self.producers.publish_order_cancelled(event);
        }
        Ok(result)
    }

    pub async fn refund_summary(&self, order_id: &OrderId) -> Result<RefundSummary, PaymentGatewayError> {
        let order = self
            .db
            .fetch_order_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        let refunds = self.db.fetch_refunds_for_order(order_id).await?;
        let total_refunded: Cents = refunds.iter().filter(|r| r.status.is_committed()).map(|r| r.amount).sum();
        Ok(RefundSummary {
            order_id: order.order_id,
            total_amount: order.total_amount,
            total_refunded,
            refundable_amount: order.total_amount - total_refunded,
            refunds,
        })
    }

    pub async fn total_refunded(&self, order_id: &OrderId) -> Result<Cents, PaymentGatewayError> {
        self.db.total_refunded(order_id).await
    }

    pub async fn refundable_amount(&self, order_id: &OrderId) -> Result<Cents, PaymentGatewayError> {
        self.db.refundable_amount(order_id).await
    }
}
