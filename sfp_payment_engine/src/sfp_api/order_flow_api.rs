use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, NewPaymentEvent, Order, OrderId, OrderStatusType},
    events::{EventProducers, OrderCancelledEvent, OrderPaidEvent, PaymentFailedEvent},
    order_state_machine::Transition,
    traits::{
        AppliedPaymentEvent,
        GuardDecision,
        OrderStatusChange,
        PaymentEventOutcome,
        PaymentGatewayDatabase,
        PaymentGatewayError,
    },
};

/// `OrderFlowApi` is the primary API for handling order and payment flows in response to provider payment events and
/// admin actions.
///
/// Event hooks are only called after the backend has committed the change they describe.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Records a new order at checkout initiation. The order is validated first, and is stored with
    /// `pending_payment` status.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        order.validate()?;
        let order = self.db.insert_order(order).await?;
        info!("🔄️📦️ Order {} created for {} {}", order.order_id, order.total_amount, order.currency);
        Ok(order)
    }

    /// Handles an authenticated payment event from the provider.
    ///
    /// The idempotency guard is consulted first. Events that were already applied, or that refer to unknown orders,
    /// are reported without touching the database. Otherwise the event is applied atomically by the backend, which
    /// re-evaluates the guard inside its transaction, so concurrent deliveries of the same event are applied once.
    ///
    /// Hooks:
    /// * `OrderPaid` fires only when this event moved the order to `paid`. A second, distinct success event for an
    ///   already paid order is recorded but fires nothing.
    /// * `PaymentFailed` fires for failed payment attempts.
    ///
    /// ## Failure modes:
    /// * `InvalidTransition` if the order status does not accept the event (e.g. a payment for a shipped order). Nothing
    ///   is persisted.
    /// * `DatabaseError` if the unit of work could not be committed. The provider should retry.
    pub async fn handle_payment_event(&self, event: NewPaymentEvent) -> Result<PaymentEventOutcome, PaymentGatewayError> {
        if event.provider_event_id.trim().is_empty() {
            return Err(PaymentGatewayError::validation("A payment event must have a provider event id"));
        }
        let event_id = event.provider_event_id.clone();
        trace!("🔄️💳️ Checking payment event {event_id} ({}) for order {}", event.kind, event.order_id);
        match self.db.check_payment_event(&event_id, &event.order_id).await? {
            GuardDecision::AlreadyProcessed => {
                info!("🔄️💳️ Payment event {event_id} has already been processed. Ignoring it.");
                return Ok(PaymentEventOutcome::AlreadyProcessed(event_id));
            },
            GuardDecision::OrderNotFound => {
                warn!("🔄️💳️ Payment event {event_id} refers to order {}, which does not exist.", event.order_id);
                return Ok(PaymentEventOutcome::OrderNotFound(event.order_id));
            },
            GuardDecision::Proceed => {},
        }
        let outcome = self.db.apply_payment_event(event).await.map_err(|e| {
            match &e {
                PaymentGatewayError::InvalidTransition(t) => {
                    error!("🔄️💳️ Payment event {event_id} was rejected by the order state machine. {t}")
                },
                e => error!("🔄️💳️ Could not apply payment event {event_id}. {e}"),
            }
            e
        })?;
        match &outcome {
            PaymentEventOutcome::Applied(applied) => self.call_payment_hooks(applied),
            PaymentEventOutcome::AlreadyProcessed(_) => {
                info!("🔄️💳️ Payment event {event_id} was applied by a concurrent delivery. Ignoring it.");
            },
            PaymentEventOutcome::OrderNotFound(oid) => {
                warn!("🔄️💳️ Payment event {event_id} refers to order {oid}, which does not exist.");
            },
        }
        Ok(outcome)
    }

    fn call_payment_hooks(&self, applied: &AppliedPaymentEvent) {
        let event_id = &applied.event.provider_event_id;
        let order = &applied.order;
        match applied.transition {
            Transition::Changed { to: OrderStatusType::Paid, .. } => {
                info!("🔄️💳️ Order {} is paid (event {event_id}).", order.order_id);
                debug!("🔄️💳️ Notifying order paid hook subscribers");
                self.producers.publish_order_paid(OrderPaidEvent::new(order.clone(), event_id.clone()));
            },
            Transition::Changed { from, to } => {
                warn!("🔄️💳️ Payment event {event_id} moved order {} from {from} to {to}.", order.order_id);
            },
            Transition::NoOp => {
                info!("🔄️💳️ Payment event {event_id} recorded. Order {} was already {}.", order.order_id, order.status);
            },
            Transition::Informational => {
                info!("🔄️💳️ Payment attempt failed for order {} (event {event_id}).", order.order_id);
                self.producers.publish_payment_failed(PaymentFailedEvent::new(order.clone(), event_id.clone()));
            },
        }
    }

    /// Cancels an order that has not entered fulfilment.
    pub async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<OrderStatusChange, PaymentGatewayError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PaymentGatewayError::validation("A cancellation reason is required"));
        }
        let change = self.db.cancel_order(order_id, reason).await?;
        info!("🔄️❌️ Order {order_id} cancelled ({} -> {}). {reason}", change.from, change.to);
        self.producers.publish_order_cancelled(OrderCancelledEvent::new(change.order.clone(), reason));
        Ok(change)
    }

    /// Moves an order to the next fulfilment status.
    pub async fn advance_fulfilment(
        &self,
        order_id: &OrderId,
        target: OrderStatusType,
    ) -> Result<OrderStatusChange, PaymentGatewayError> {
        let change = self.db.advance_fulfilment(order_id, target).await?;
        info!("🔄️🚚️ Order {order_id} moved from {} to {}", change.from, change.to);
        Ok(change)
    }

    /// Appends a free-text note to the order. Notes do not affect the order in any other way.
    pub async fn add_note(&self, order_id: &OrderId, note: &str) -> Result<Order, PaymentGatewayError> {
        let order = self.db.append_note(order_id, note).await?;
        debug!("🔄️📝️ Note added to order {order_id}");
        Ok(order)
    }
}
