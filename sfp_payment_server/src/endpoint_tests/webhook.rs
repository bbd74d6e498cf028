use actix_web::http::StatusCode;
use chrono::Utc;
use sfp_payment_engine::{
    db_types::{OrderId, OrderStatusType},
    traits::OrderManagement,
};

use super::helpers::{
    provider_event,
    send_request,
    signed_webhook,
    signed_webhook_at,
    unsigned_webhook,
    TestStore,
    SECRET,
    SIGNATURE_HEADER,
};
use crate::{
    helpers::signature_header_value,
    notifications::{Audience, NotificationKind},
    provider_events::{CHECKOUT_SESSION_COMPLETED, PAYMENT_INTENT_FAILED, PAYMENT_INTENT_SUCCEEDED},
};

async fn status_of(store: &TestStore, order_id: &str) -> OrderStatusType {
    store.db.fetch_order_by_order_id(&OrderId::new(order_id)).await.unwrap().expect("order exists").status
}

#[actix_web::test]
async fn replayed_webhook_is_acknowledged_once() {
    let store = TestStore::new().await;
    store.create_order("ord_1", 24_000).await;
    let body = provider_event("evt_a", CHECKOUT_SESSION_COMPLETED, "ord_1");

    let (status, response) = send_request(signed_webhook(&body), store.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains(r#""success":true"#), "{response}");
    assert!(response.contains("Order ord_1 is paid"), "{response}");
    assert_eq!(status_of(&store, "ord_1").await, OrderStatusType::Paid);

    let (status, response) = send_request(signed_webhook(&body), store.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("Event already processed"), "{response}");

    let events = store.db.fetch_payment_events_for_order(&OrderId::new("ord_1")).await.unwrap();
    assert_eq!(events.len(), 1);
    let transport = store.shutdown().await;
    assert_eq!(transport.count(NotificationKind::OrderPaid), 2);
    let sent = transport.sent();
    assert!(sent.iter().any(|n| n.audience == Audience::Customer && n.recipient == "alice@example.com"));
    assert!(sent.iter().any(|n| n.audience == Audience::Operator && n.recipient == "ops@example.com"));
}

#[actix_web::test]
async fn bad_signatures_are_rejected_before_processing() {
    let store = TestStore::new().await;
    store.create_order("ord_1", 24_000).await;
    let body = provider_event("evt_a", PAYMENT_INTENT_SUCCEEDED, "ord_1");

    let (status, _) = send_request(unsigned_webhook(&body), store.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let now = Utc::now().timestamp();
    let forged = unsigned_webhook(&body).insert_header((SIGNATURE_HEADER, format!("t={now},v1=deadbeef")));
    let (status, response) = send_request(forged, store.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response.contains("signature is invalid"), "{response}");

    // Signed with the right secret, but for a different body
    let other = provider_event("evt_a", PAYMENT_INTENT_SUCCEEDED, "ord_2");
    let signature = signature_header_value(SECRET, now, other.as_bytes());
    let swapped = unsigned_webhook(&body).insert_header((SIGNATURE_HEADER, signature));
    let (status, _) = send_request(swapped, store.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let wrong_secret = signature_header_value("whsec_other", now, body.as_bytes());
    let (status, _) =
        send_request(unsigned_webhook(&body).insert_header((SIGNATURE_HEADER, wrong_secret)), store.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stale = signed_webhook_at(&body, Utc::now().timestamp() - 3600);
    let (status, response) = send_request(stale, store.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response.contains("tolerance"), "{response}");

    assert_eq!(status_of(&store, "ord_1").await, OrderStatusType::PendingPayment);
    let transport = store.shutdown().await;
    assert!(transport.sent().is_empty());
}

#[actix_web::test]
async fn stray_payment_for_shipped_order_is_acknowledged() {
    let store = TestStore::new().await;
    store.create_paid_order("ord_2", 9_900).await;
    let api = store.orders_api();
    let id = OrderId::new("ord_2");
    api.advance_fulfilment(&id, OrderStatusType::Preparing).await.unwrap();
    api.advance_fulfilment(&id, OrderStatusType::Shipped).await.unwrap();
    drop(api);

    let body = provider_event("evt_stray", PAYMENT_INTENT_SUCCEEDED, "ord_2");
    let (status, response) = send_request(signed_webhook(&body), store.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains(r#""success":false"#), "{response}");
    assert_eq!(status_of(&store, "ord_2").await, OrderStatusType::Shipped);
    assert!(store.db.fetch_payment_event("evt_stray").await.unwrap().is_none());
    store.shutdown().await;
}

#[actix_web::test]
async fn unknown_orders_and_event_types_are_acknowledged() {
    let store = TestStore::new().await;

    let body = provider_event("evt_x", CHECKOUT_SESSION_COMPLETED, "ord_missing");
    let (status, response) = send_request(signed_webhook(&body), store.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("Order ord_missing does not exist"), "{response}");

    let body = provider_event("evt_y", "customer.created", "ord_missing");
    let (status, response) = send_request(signed_webhook(&body), store.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains(r#""success":true"#), "{response}");

    let body = r#"{"id":"evt_z","type":"payment_intent.succeeded","data":{"object":{"id":"pi_z"}}}"#;
    let (status, response) = send_request(signed_webhook(body), store.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("does not reference an order"), "{response}");
    store.shutdown().await;
}

#[actix_web::test]
async fn malformed_bodies_are_rejected() {
    let store = TestStore::new().await;
    let (status, _) = send_request(signed_webhook(r#"{"type":"checkout.session.completed"}"#), store.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send_request(signed_webhook("not json"), store.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    store.shutdown().await;
}

#[actix_web::test]
async fn failed_payments_notify_the_operator_only() {
    let store = TestStore::new().await;
    store.create_order("ord_3", 5_000).await;
    let body = provider_event("evt_f", PAYMENT_INTENT_FAILED, "ord_3");
    let (status, response) = send_request(signed_webhook(&body), store.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("Order ord_3 is pending_payment"), "{response}");
    assert_eq!(status_of(&store, "ord_3").await, OrderStatusType::PendingPayment);
    let transport = store.shutdown().await;
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::PaymentFailed);
    assert_eq!(sent[0].audience, Audience::Operator);
}

#[actix_web::test]
async fn blank_event_ids_are_rejected() {
    let store = TestStore::new().await;
    store.create_order("ord_4", 12_000).await;
    store.create_order("ord_5", 7_500).await;

    for (id, order) in [("", "ord_4"), ("   ", "ord_5")] {
        let body = provider_event(id, CHECKOUT_SESSION_COMPLETED, order);
        let (status, response) = send_request(signed_webhook(&body), store.configure()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(response.contains("event id is blank"), "{response}");
    }
    assert_eq!(status_of(&store, "ord_4").await, OrderStatusType::PendingPayment);
    assert_eq!(status_of(&store, "ord_5").await, OrderStatusType::PendingPayment);
    assert!(store.db.fetch_payment_events_for_order(&OrderId::new("ord_4")).await.unwrap().is_empty());

    // Real event ids still go through for both orders
    for (id, order) in [("evt_b4", "ord_4"), ("evt_b5", "ord_5")] {
        let body = provider_event(id, CHECKOUT_SESSION_COMPLETED, order);
        let (status, response) = send_request(signed_webhook(&body), store.configure()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(response.contains(r#""success":true"#), "{response}");
    }
    assert_eq!(status_of(&store, "ord_5").await, OrderStatusType::Paid);
    let transport = store.shutdown().await;
    assert_eq!(transport.count(NotificationKind::OrderPaid), 4);
}

#[actix_web::test]
async fn simultaneous_session_and_intent_events_notify_once() {
    let store = TestStore::new().await;
    store.create_order("ord_6", 31_000).await;
    let session = provider_event("evt_cs_6", CHECKOUT_SESSION_COMPLETED, "ord_6");
    let intent = provider_event("evt_pi_6", PAYMENT_INTENT_SUCCEEDED, "ord_6");

    let (a, b) = tokio::join!(
        send_request(signed_webhook(&session), store.configure()),
        send_request(signed_webhook(&intent), store.configure()),
    );
    assert_eq!(a.0, StatusCode::OK, "{}", a.1);
    assert_eq!(b.0, StatusCode::OK, "{}", b.1);
    assert_eq!(status_of(&store, "ord_6").await, OrderStatusType::Paid);
    let events = store.db.fetch_payment_events_for_order(&OrderId::new("ord_6")).await.unwrap();
    assert_eq!(events.len(), 2);

    let transport = store.shutdown().await;
    assert_eq!(transport.count(NotificationKind::OrderPaid), 2);
    let sent = transport.sent();
    assert_eq!(sent.iter().filter(|n| n.audience == Audience::Customer).count(), 1);
    assert_eq!(sent.iter().filter(|n| n.audience == Audience::Operator).count(), 1);
}
