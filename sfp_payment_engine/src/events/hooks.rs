use std::{future::Future, pin::Pin, sync::Arc};

use tokio::task::JoinHandle;

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderCancelledEvent,
    OrderPaidEvent,
    PaymentFailedEvent,
    RefundUpdatedEvent,
};

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub order_cancelled_producer: Vec<EventProducer<OrderCancelledEvent>>,
    pub payment_failed_producer: Vec<EventProducer<PaymentFailedEvent>>,
    pub refund_updated_producer: Vec<EventProducer<RefundUpdatedEvent>>,
}

impl EventProducers {
    pub fn publish_order_paid(&self, event: OrderPaidEvent) {
        self.order_paid_producer.iter().for_each(|p| p.publish_event(event.clone()));
    }

    pub fn publish_order_cancelled(&self, event: OrderCancelledEvent) {
        self.order_cancelled_producer.iter().for_each(|p| p.publish_event(event.clone()));
    }

    pub fn publish_payment_failed(&self, event: PaymentFailedEvent) {
        self.payment_failed_producer.iter().for_each(|p| p.publish_event(event.clone()));
    }

    pub fn publish_refund_updated(&self, event: RefundUpdatedEvent) {
        self.refund_updated_producer.iter().for_each(|p| p.publish_event(event.clone()));
    }
}

pub struct EventHandlers {
    pub on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    pub on_order_cancelled: Option<EventHandler<OrderCancelledEvent>>,
    pub on_payment_failed: Option<EventHandler<PaymentFailedEvent>>,
    pub on_refund_updated: Option<EventHandler<RefundUpdatedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_paid = hooks.on_order_paid.map(|f| EventHandler::new(buffer_size, f));
        let on_order_cancelled = hooks.on_order_cancelled.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_failed = hooks.on_payment_failed.map(|f| EventHandler::new(buffer_size, f));
        let on_refund_updated = hooks.on_refund_updated.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_paid, on_order_cancelled, on_payment_failed, on_refund_updated }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_cancelled {
            result.order_cancelled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_failed {
            result.payment_failed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_refund_updated {
            result.refund_updated_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns a task per registered handler. Each task ends once all of its producers have been dropped and its
    /// in-flight events are handled, so awaiting the handles is a clean shutdown.
    pub fn start_handlers(self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        if let Some(handler) = self.on_order_paid {
            handles.push(tokio::spawn(handler.start_handler()));
        }
        if let Some(handler) = self.on_order_cancelled {
            handles.push(tokio::spawn(handler.start_handler()));
        }
        if let Some(handler) = self.on_payment_failed {
            handles.push(tokio::spawn(handler.start_handler()));
        }
        if let Some(handler) = self.on_refund_updated {
            handles.push(tokio::spawn(handler.start_handler()));
        }
        handles
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_order_cancelled: Option<Handler<OrderCancelledEvent>>,
    pub on_payment_failed: Option<Handler<PaymentFailedEvent>>,
    pub on_refund_updated: Option<Handler<RefundUpdatedEvent>>,
}

impl EventHooks {
    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_order_cancelled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCancelledEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_cancelled = Some(Arc::new(f));
        self
    }

    pub fn on_payment_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentFailedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_payment_failed = Some(Arc::new(f));
        self
    }

    pub fn on_refund_updated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RefundUpdatedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_refund_updated = Some(Arc::new(f));
        self
    }
}
