//! Notification dispatcher
//!
//! Committed order changes are announced by the payment engine through its event hooks. The dispatcher subscribes to
//! those hooks and turns each event into notifications for the customer and/or the operations inbox, which are handed
//! to a [`NotificationTransport`].
//!
//! Delivery is best-effort. Every notification is sent independently, with its own timeout, and a failure is logged and
//! forgotten. Nothing here can affect the order change that triggered it, because that change has already been
//! committed by the time the hook runs.
use std::{sync::Arc, time::Duration};

use futures::future::{join_all, BoxFuture};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sfp_payment_engine::{
    db_types::{Order, OrderId},
    events::{EventHooks, OrderCancelledEvent, OrderPaidEvent, PaymentFailedEvent, RefundUpdatedEvent},
};
use thiserror::Error;

const LOG_TARGET: &str = "sfp::notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderPaid,
    OrderCancelled,
    PaymentFailed,
    RefundUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Customer,
    Operator,
}

/// A single message to a single recipient. Rendering the message is up to whatever sits behind the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub audience: Audience,
    pub recipient: String,
    pub order_id: OrderId,
    pub payload: Value,
}

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("Could not configure the notification transport. {0}")]
    Configuration(String),
    #[error("The notification could not be delivered. {0}")]
    Transport(String),
    #[error("The notification was not delivered within {0:?}")]
    Timeout(Duration),
}

#[cfg_attr(test, mockall::automock)]
pub trait NotificationTransport: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn send(&self, notification: Notification) -> BoxFuture<'static, Result<(), NotificationError>>;
}

//--------------------------------------------   LogTransport  ---------------------------------------------------------
/// Writes notifications to the `sfp::notifications` log target. Used when no relay is configured.
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

impl NotificationTransport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    fn send(&self, notification: Notification) -> BoxFuture<'static, Result<(), NotificationError>> {
        info!(
            target: LOG_TARGET,
            "📣️ {:?} notification for order {} to {} ({:?}): {}",
            notification.kind,
            notification.order_id,
            notification.recipient,
            notification.audience,
            notification.payload
        );
        Box::pin(async { Ok(()) })
    }
}

//--------------------------------------------   HttpRelayTransport  ---------------------------------------------------
/// POSTs each notification as JSON to a relay service (e.g. an email gateway).
#[derive(Debug, Clone)]
pub struct HttpRelayTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpRelayTransport {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Configuration(e.to_string()))?;
        Ok(Self { client, url: url.to_string() })
    }
}

impl NotificationTransport for HttpRelayTransport {
    fn name(&self) -> &'static str {
        "http-relay"
    }

    fn send(&self, notification: Notification) -> BoxFuture<'static, Result<(), NotificationError>> {
        let client = self.client.clone();
        let url = self.url.clone();
        Box::pin(async move {
            let response = client
                .post(&url)
                .json(&notification)
                .send()
                .await
                .map_err(|e| NotificationError::Transport(e.to_string()))?;
            response.error_for_status().map_err(|e| NotificationError::Transport(e.to_string()))?;
            Ok(())
        })
    }
}

//--------------------------------------------   NotificationDispatcher  -----------------------------------------------
#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationTransport>,
    operator_email: String,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn NotificationTransport>, operator_email: &str, timeout: Duration) -> Self {
        Self { transport, operator_email: operator_email.to_string(), timeout }
    }

    /// Sends every notification concurrently. Each one succeeds or fails on its own.
    pub async fn dispatch(&self, notifications: Vec<Notification>) {
        let attempts = notifications.into_iter().map(|n| self.send_one(n));
        let results = join_all(attempts).await;
        let failed = results.iter().filter(|ok| !**ok).count();
        if failed > 0 {
            warn!(target: LOG_TARGET, "📣️ {failed} of {} notifications could not be delivered", results.len());
        }
    }

    async fn send_one(&self, notification: Notification) -> bool {
        let kind = notification.kind;
        let audience = notification.audience;
        let order_id = notification.order_id.clone();
        let attempt = self.transport.send(notification);
        let result = match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(NotificationError::Timeout(self.timeout)),
        };
        match result {
            Ok(()) => {
                debug!(target: LOG_TARGET, "📣️ {kind:?} notification for order {order_id} sent to {audience:?}");
                true
            },
            Err(e) => {
                warn!(
                    target: LOG_TARGET,
                    "📣️ NotificationFailure: {kind:?} for order {order_id} to {audience:?} via {}. {e}",
                    self.transport.name()
                );
                false
            },
        }
    }

    fn to_customer_and_operator(&self, kind: NotificationKind, order: &Order, payload: Value) -> Vec<Notification> {
        vec![
            Notification {
                kind,
                audience: Audience::Customer,
                recipient: order.customer_email.clone(),
                order_id: order.order_id.clone(),
                payload: payload.clone(),
            },
            self.to_operator(kind, order.order_id.clone(), payload),
        ]
    }

    fn to_operator(&self, kind: NotificationKind, order_id: OrderId, payload: Value) -> Notification {
        Notification { kind, audience: Audience::Operator, recipient: self.operator_email.clone(), order_id, payload }
    }

    pub fn order_paid_notifications(&self, event: &OrderPaidEvent) -> Vec<Notification> {
        let mut payload = order_summary(&event.order);
        payload["provider_event_id"] = json!(event.provider_event_id);
        self.to_customer_and_operator(NotificationKind::OrderPaid, &event.order, payload)
    }

    pub fn order_cancelled_notifications(&self, event: &OrderCancelledEvent) -> Vec<Notification> {
        let mut payload = order_summary(&event.order);
        payload["reason"] = json!(event.reason);
        self.to_customer_and_operator(NotificationKind::OrderCancelled, &event.order, payload)
    }

    pub fn payment_failed_notifications(&self, event: &PaymentFailedEvent) -> Vec<Notification> {
        let mut payload = order_summary(&event.order);
        payload["provider_event_id"] = json!(event.provider_event_id);
        vec![self.to_operator(NotificationKind::PaymentFailed, event.order.order_id.clone(), payload)]
    }

    pub fn refund_updated_notifications(&self, event: &RefundUpdatedEvent) -> Vec<Notification> {
        let refund = &event.refund;
        let payload = json!({
            "refund_id": refund.id,
            "amount": refund.amount,
            "status": refund.status.to_string(),
            "method": refund.method,
            "reason": refund.reason,
        });
        vec![self.to_operator(NotificationKind::RefundUpdated, refund.order_id.clone(), payload)]
    }

    /// Subscribes the dispatcher to the engine's event hooks.
    pub fn into_hooks(self) -> EventHooks {
        let dispatcher = Arc::new(self);
        let mut hooks = EventHooks::default();
        let d = Arc::clone(&dispatcher);
        hooks.on_order_paid(move |ev| {
            let d = Arc::clone(&d);
            Box::pin(async move { d.dispatch(d.order_paid_notifications(&ev)).await })
        });
        let d = Arc::clone(&dispatcher);
        hooks.on_order_cancelled(move |ev| {
            let d = Arc::clone(&d);
            Box::pin(async move { d.dispatch(d.order_cancelled_notifications(&ev)).await })
        });
        let d = Arc::clone(&dispatcher);
        hooks.on_payment_failed(move |ev| {
            let d = Arc::clone(&d);
            Box::pin(async move { d.dispatch(d.payment_failed_notifications(&ev)).await })
        });
        let d = dispatcher;
        hooks.on_refund_updated(move |ev| {
            let d = Arc::clone(&d);
            Box::pin(async move { d.dispatch(d.refund_updated_notifications(&ev)).await })
        });
        hooks
    }
}

fn order_summary(order: &Order) -> Value {
    json!({
        "order_id": order.order_id,
        "status": order.status.to_string(),
        "total_amount": order.total_amount,
        "currency": order.currency,
    })
}
