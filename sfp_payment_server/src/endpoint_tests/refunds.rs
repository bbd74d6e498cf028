use actix_web::http::StatusCode;
use serde_json::{json, Value};

use super::helpers::{get, post_json, send_request, TestStore};
use crate::notifications::NotificationKind;

fn refund_id(body: &str) -> i64 {
    let refund: Value = serde_json::from_str(body).expect("refund json");
    refund["id"].as_i64().expect("refund id")
}

#[actix_web::test]
async fn partial_refund_limits_what_is_refundable() {
    let store = TestStore::new().await;
    store.create_paid_order("ord_1", 24_000).await;

    let request = json!({"order_id": "ord_1", "amount": 5000, "reason": "Scratched table top"});
    let (status, body) = send_request(post_json("/api/refunds", request), store.configure()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""status":"pending""#), "{body}");
    assert!(body.contains(r#""method":"original""#), "{body}");
    let id = refund_id(&body);

    let (status, body) = send_request(post_json(&format!("/api/refunds/{id}/approve"), json!({})), store.configure()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains(r#""status":"approved""#), "{body}");

    let (status, body) = send_request(get("/api/refunds/order/ord_1"), store.configure()).await;
    assert_eq!(status, StatusCode::OK);
    let summary: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(summary["total_refunded"], 5000);
    assert_eq!(summary["refundable_amount"], 19_000);

    let request = json!({"order_id": "ord_1", "amount": 20_000, "reason": "Changed my mind"});
    let (status, body) = send_request(post_json("/api/refunds", request), store.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    // Approving twice is not a valid refund transition
    let (status, _) = send_request(post_json(&format!("/api/refunds/{id}/approve"), json!({})), store.configure()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let transport = store.shutdown().await;
    assert_eq!(transport.count(NotificationKind::RefundUpdated), 2);
}

#[actix_web::test]
async fn refunds_for_unknown_or_unpaid_orders_are_rejected() {
    let store = TestStore::new().await;
    store.create_order("ord_unpaid", 1_000).await;

    let request = json!({"order_id": "ord_missing", "amount": 100, "reason": "Damaged"});
    let (status, _) = send_request(post_json("/api/refunds", request), store.configure()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let request = json!({"order_id": "ord_unpaid", "amount": 100, "reason": "Damaged"});
    let (status, body) = send_request(post_json("/api/refunds", request), store.configure()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("has not been paid"), "{body}");

    let (status, _) = send_request(post_json("/api/refunds/999/approve", json!({})), store.configure()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_request(get("/api/refunds/order/ord_missing"), store.configure()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    store.shutdown().await;
}

#[actix_web::test]
async fn processing_a_full_refund_cancels_the_order() {
    let store = TestStore::new().await;
    store.create_paid_order("ord_4", 3_000).await;

    let request = json!({"order_id": "ord_4", "amount": 3000, "reason": "Never delivered", "method": "manual"});
    let (status, body) = send_request(post_json("/api/refunds", request), store.configure()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let id = refund_id(&body);

    let (status, _) = send_request(post_json(&format!("/api/refunds/{id}/process"), json!({})), store.configure()).await;
    assert_eq!(status, StatusCode::CONFLICT, "a pending refund cannot be processed");

    send_request(post_json(&format!("/api/refunds/{id}/approve"), json!({})), store.configure()).await;
    let (status, body) = send_request(post_json(&format!("/api/refunds/{id}/process"), json!({})), store.configure()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let processed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(processed["refund"]["status"], "processed");
    assert_eq!(processed["order_change"]["to"], "cancelled");

    let transport = store.shutdown().await;
    assert_eq!(transport.count(NotificationKind::OrderCancelled), 2);
}

#[actix_web::test]
async fn declined_refunds_do_not_count() {
    let store = TestStore::new().await;
    store.create_paid_order("ord_5", 8_000).await;
    let request = json!({"order_id": "ord_5", "amount": 8000, "reason": "Duplicate request"});
    let (_, body) = send_request(post_json("/api/refunds", request), store.configure()).await;
    let id = refund_id(&body);
    let (status, body) = send_request(post_json(&format!("/api/refunds/{id}/decline"), json!({})), store.configure()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""status":"declined""#), "{body}");

    let (_, body) = send_request(get("/api/refunds/order/ord_5"), store.configure()).await;
    let summary: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(summary["refundable_amount"], 8000);
    assert_eq!(summary["refunds"].as_array().map(Vec::len), Some(1));
    store.shutdown().await;
}
