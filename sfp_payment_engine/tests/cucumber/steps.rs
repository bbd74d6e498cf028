use std::str::FromStr;

use cucumber::{given, then, when};
use sfp_payment_engine::{
    db_types::{Cents, NewOrder, NewOrderItem, NewPaymentEvent, NewRefund, OrderId, OrderStatusType, PaymentEventKind, PaymentMethod, RefundMethod},
    OrderManagement,
};

use crate::cucumber::StoreWorld;

#[given(expr = "an order {word} from {string} for {int} cents")]
async fn receive_order(world: &mut StoreWorld, order_id: String, email: String, total: i64) {
    let order = NewOrder::new(OrderId::new(order_id), &email, "EUR", PaymentMethod::Card)
        .with_item(NewOrderItem::new("linen-sofa", Cents::from(total), 1));
    world.orders().create_order(order).await.expect("Error creating order");
}

#[when(expr = "the provider delivers {word} event {word} for order {word}")]
async fn deliver_event(world: &mut StoreWorld, kind: String, event_id: String, order_id: String) {
    let kind = PaymentEventKind::from_str(&kind).expect("Unknown payment event kind");
    let event = NewPaymentEvent::new(event_id.as_str(), OrderId::new(order_id), kind).with_reference(format!("pi_{event_id}"));
    let result = world.orders().handle_payment_event(event).await;
    world.record(result);
}

#[when(expr = "order {word} moves to {word}")]
async fn advance_order(world: &mut StoreWorld, order_id: String, status: String) {
    let status = OrderStatusType::from_str(&status).expect("Unknown order status");
    let result = world.orders().advance_fulfilment(&OrderId::new(order_id), status).await;
    world.record(result);
}

#[when(expr = "I request a refund of {int} cents for order {word} because {string}")]
async fn request_refund(world: &mut StoreWorld, amount: i64, order_id: String, reason: String) {
    let refund = NewRefund::new(OrderId::new(order_id), Cents::from(amount), reason, RefundMethod::Original);
    let result = world.refunds().create_refund(refund).await;
    if let Some(refund) = world.record(result) {
        world.last_refund_id = Some(refund.id);
    }
}

fn last_refund(world: &StoreWorld) -> i64 {
    world.last_refund_id.expect("No refund has been created")
}

#[when("I approve the refund")]
async fn approve_refund(world: &mut StoreWorld) {
    let id = last_refund(world);
    let result = world.refunds().approve_refund(id).await;
    world.record(result);
}

#[when("I decline the refund")]
async fn decline_refund(world: &mut StoreWorld) {
    let id = last_refund(world);
    let result = world.refunds().decline_refund(id).await;
    world.record(result);
}

#[when("I process the refund")]
async fn process_refund(world: &mut StoreWorld) {
    let id = last_refund(world);
    let result = world.refunds().process_refund(id).await;
    world.record(result);
}

#[then(expr = "order {word} has status {word}")]
async fn check_status(world: &mut StoreWorld, order_id: String, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Unknown order status");
    let order = world
        .orders()
        .db()
        .fetch_order_by_order_id(&OrderId::new(order_id))
        .await
        .expect("Error fetching order")
        .expect("Order does not exist");
    assert_eq!(order.status, expected);
}

#[then(expr = "order {word} has {int} recorded payment event(s)")]
async fn check_event_count(world: &mut StoreWorld, order_id: String, count: usize) {
    let events =
        world.orders().db().fetch_payment_events_for_order(&OrderId::new(order_id)).await.expect("Error fetching events");
    assert_eq!(events.len(), count);
}

#[then(expr = "order {word} has {int} cents refunded and {int} cents refundable")]
async fn check_refund_totals(world: &mut StoreWorld, order_id: String, refunded: i64, refundable: i64) {
    let summary = world.refunds().refund_summary(&OrderId::new(order_id)).await.expect("Error fetching refund summary");
    assert_eq!(summary.total_refunded, Cents::from(refunded), "Total refunded is incorrect");
    assert_eq!(summary.refundable_amount, Cents::from(refundable), "Refundable amount is incorrect");
}

#[then(expr = "order {word} has {int} refund(s)")]
async fn check_refund_count(world: &mut StoreWorld, order_id: String, count: usize) {
    let summary = world.refunds().refund_summary(&OrderId::new(order_id)).await.expect("Error fetching refund summary");
    assert_eq!(summary.refunds.len(), count);
}

#[then("the last action succeeded")]
async fn check_success(world: &mut StoreWorld) {
    assert!(world.last_error.is_none(), "Unexpected error: {:?}", world.last_error);
}

#[then(expr = "the last action failed with {string}")]
async fn check_failure(world: &mut StoreWorld, message: String) {
    let err = world.last_error.as_ref().expect("The last action did not fail");
    let text = err.to_string();
    assert!(text.contains(&message), "Expected an error containing '{message}', but got '{text}'");
}
