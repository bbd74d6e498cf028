use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use sfp_payment_engine::{
    db_types::{Cents, Order, OrderId, OrderItem, OrderStatusType, PaymentMethod},
    OrderTrackingApi,
};

use super::{
    helpers::{get, post_json, send_request, TestStore},
    mocks::MockOrderManager,
};
use crate::{
    notifications::NotificationKind,
    routes::{OrderDetailsRoute, OrderLookupRoute},
};

fn configure(cfg: &mut ServiceConfig) {
    let mut order_manager = MockOrderManager::new();
    order_manager.expect_fetch_order_by_order_id().returning(|id| {
        Ok((id.as_str() == "ord_1").then(stored_order))
    });
    order_manager.expect_fetch_order_items().returning(|_| Ok(stored_items()));
    order_manager.expect_fetch_payment_events_for_order().returning(|_| Ok(vec![]));
    order_manager.expect_fetch_audit_log().returning(|_| Ok(vec![]));
    let api = OrderTrackingApi::new(order_manager);
    cfg.service(OrderLookupRoute::<MockOrderManager>::new())
        .service(web::scope("/api").service(OrderDetailsRoute::<MockOrderManager>::new()))
        .app_data(web::Data::new(api));
}

fn stored_order() -> Order {
    Order {
        id: 1,
        order_id: OrderId::new("ord_1"),
        customer_email: "Alice@Example.com".into(),
        status: OrderStatusType::Shipped,
        total_amount: Cents::from(24_000),
        currency: "EUR".into(),
        payment_method: PaymentMethod::Card,
        notes: String::new(),
        payment_reference: Some("pi_1".into()),
        created_at: Utc.with_ymd_and_hms(2024, 10, 1, 9, 30, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2024, 10, 3, 14, 0, 0).unwrap(),
    }
}

fn stored_items() -> Vec<OrderItem> {
    vec![OrderItem {
        line_no: 1,
        product_id: "oak-dining-table".into(),
        unit_price: Cents::from(24_000),
        quantity: 1,
        subtotal: Cents::from(24_000),
    }]
}

#[actix_web::test]
async fn lookup_with_matching_email() {
    let _ = env_logger::try_init();
    let request = json!({"order_id": "ord_1", "email": "  alice@example.COM "});
    let (status, body) = send_request(post_json("/order/lookup", request), configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["status"], "shipped");
    assert_eq!(result["total_amount"], 24_000);
    assert_eq!(result["items"][0]["product_id"], "oak-dining-table");
    assert!(result.get("customer_email").is_none());
    assert!(result.get("payment_reference").is_none());
}

#[actix_web::test]
async fn lookup_does_not_reveal_which_part_was_wrong() {
    let _ = env_logger::try_init();
    let wrong_email = json!({"order_id": "ord_1", "email": "mallory@example.com"});
    let (status, wrong_email_body) = send_request(post_json("/order/lookup", wrong_email), configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let unknown = json!({"order_id": "ord_404", "email": "alice@example.com"});
    let (status, unknown_body) = send_request(post_json("/order/lookup", unknown), configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(wrong_email_body, unknown_body);
}

#[actix_web::test]
async fn order_details() {
    let _ = env_logger::try_init();
    let (status, body) = send_request(get("/api/orders/ord_1"), configure).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let details: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(details["order"]["customer_email"], "Alice@Example.com");
    assert_eq!(details["items"].as_array().map(Vec::len), Some(1));

    let (status, _) = send_request(get("/api/orders/ord_404"), configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn order_admin_lifecycle() {
    let store = TestStore::new().await;
    let new_order = json!({
        "order_id": "ord_7",
        "customer_email": "bob@example.com",
        "total_amount": 30_000,
        "currency": "EUR",
        "payment_method": "card",
        "items": [
            {"product_id": "linen-sofa", "unit_price": 27_000, "quantity": 1},
            {"product_id": "cushion", "unit_price": 1_500, "quantity": 2}
        ]
    });
    let (status, body) = send_request(post_json("/api/orders", new_order.clone()), store.configure()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""status":"pending_payment""#), "{body}");

    let (status, _) = send_request(post_json("/api/orders", new_order), store.configure()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mismatched = json!({
        "order_id": "ord_8",
        "customer_email": "bob@example.com",
        "total_amount": 100,
        "currency": "EUR",
        "payment_method": "card",
        "items": [{"product_id": "stool", "unit_price": 99, "quantity": 1}]
    });
    let (status, _) = send_request(post_json("/api/orders", mismatched), store.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let note = json!({"order_id": "ord_7", "note": "Customer asked for delivery after 5pm"});
    let (status, body) = send_request(post_json("/api/orders/note", note), store.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("after 5pm"), "{body}");

    let fulfil = json!({"order_id": "ord_7", "status": "preparing"});
    let (status, _) = send_request(post_json("/api/orders/fulfilment", fulfil), store.configure()).await;
    assert_eq!(status, StatusCode::CONFLICT, "unpaid orders cannot be prepared");

    let cancel = json!({"order_id": "ord_7", "reason": "  "});
    let (status, _) = send_request(post_json("/api/orders/cancel", cancel), store.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let cancel = json!({"order_id": "ord_7", "reason": "Fabric discontinued"});
    let (status, body) = send_request(post_json("/api/orders/cancel", cancel), store.configure()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let change: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(change["from"], "pending_payment");
    assert_eq!(change["to"], "cancelled");

    let (status, body) = send_request(get("/api/orders/ord_7"), store.configure()).await;
    assert_eq!(status, StatusCode::OK);
    let details: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(details["order"]["status"], "cancelled");
    assert!(details["audit_log"].as_array().map(|a| a.len() >= 2).unwrap_or(false), "{body}");

    let transport = store.shutdown().await;
    assert_eq!(transport.count(NotificationKind::OrderCancelled), 2);
}
