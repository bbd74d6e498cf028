use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sfp_payment_engine::db_types::{Cents, NewRefund, OrderId, OrderStatusType, RefundMethod};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLookupRequest {
    pub order_id: OrderId,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub order_id: OrderId,
    pub amount: Cents,
    pub reason: String,
    #[serde(default = "default_refund_method")]
    pub method: RefundMethod,
}

fn default_refund_method() -> RefundMethod {
    RefundMethod::Original
}

impl From<RefundRequest> for NewRefund {
    fn from(r: RefundRequest) -> Self {
        NewRefund::new(r.order_id, r.amount, r.reason, r.method)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderParams {
    pub order_id: OrderId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfilmentParams {
    pub order_id: OrderId,
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderNoteParams {
    pub order_id: OrderId,
    pub note: String,
}
