use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use mockall::mock;
use sfp_payment_engine::{
    db_types::{AuditLogEntry, Order, OrderId, OrderItem, PaymentEvent},
    traits::{OrderManagement, PaymentGatewayError},
};

use crate::notifications::{Notification, NotificationError, NotificationKind, NotificationTransport};

mock! {
    pub OrderManager {}
    impl OrderManagement for OrderManager {
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;
        async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError>;
        async fn fetch_payment_event(&self, provider_event_id: &str) -> Result<Option<PaymentEvent>, PaymentGatewayError>;
        async fn fetch_payment_events_for_order(&self, order_id: &OrderId) -> Result<Vec<PaymentEvent>, PaymentGatewayError>;
        async fn fetch_audit_log(&self, order_id: &OrderId) -> Result<Vec<AuditLogEntry>, PaymentGatewayError>;
    }
}

/// Keeps every notification it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.sent.lock().unwrap().iter().filter(|n| n.kind == kind).count()
    }
}

impl NotificationTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn send(&self, notification: Notification) -> BoxFuture<'static, Result<(), NotificationError>> {
        self.sent.lock().unwrap().push(notification);
        Box::pin(async { Ok(()) })
    }
}
