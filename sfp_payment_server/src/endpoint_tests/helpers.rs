use std::time::Duration;

use actix_web::{
    body::MessageBody,
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::Utc;
use log::debug;
use serde_json::json;
use sfp_common::Secret;
use sfp_payment_engine::{
    db_types::{Cents, NewOrder, NewOrderItem, NewPaymentEvent, OrderId, PaymentEventKind, PaymentMethod},
    events::{EventHandlers, EventProducers},
    test_utils::prepare_env::new_test_database,
    OrderFlowApi,
    OrderTrackingApi,
    RefundApi,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

use super::mocks::RecordingTransport;
use crate::{
    config::ServerOptions,
    helpers::signature_header_value,
    middleware::WebhookSignatureFactory,
    notifications::NotificationDispatcher,
    provider_routes::ProviderWebhookRoute,
    routes::{
        AddOrderNoteRoute,
        AdvanceFulfilmentRoute,
        ApproveRefundRoute,
        CancelOrderRoute,
        CreateOrderRoute,
        CreateRefundRoute,
        DeclineRefundRoute,
        OrderDetailsRoute,
        ProcessRefundRoute,
        RefundsForOrderRoute,
    },
};

pub const SECRET: &str = "whsec_test_4f1c2a";
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Sends a single request to an app built with `configure`. Errors raised by middleware are rendered the same way the
/// server would render them.
pub async fn send_request(
    req: TestRequest,
    configure: impl FnOnce(&mut ServiceConfig),
) -> (StatusCode, String) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let (_, res) = res.into_parts();
            let status = res.status();
            let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
            (status, body)
        },
        Err(e) => (e.as_response_error().status_code(), e.to_string()),
    }
}

pub fn get(path: &str) -> TestRequest {
    TestRequest::get().uri(path)
}

pub fn post_json(path: &str, body: serde_json::Value) -> TestRequest {
    TestRequest::post().uri(path).insert_header(ContentType::json()).set_payload(body.to_string())
}

pub fn provider_event(event_id: &str, event_type: &str, order_id: &str) -> String {
    json!({
        "id": event_id,
        "type": event_type,
        "data": {"object": {"id": format!("pi_{event_id}"), "metadata": {"order_id": order_id}}}
    })
    .to_string()
}

pub fn signed_webhook(body: &str) -> TestRequest {
    signed_webhook_at(body, Utc::now().timestamp())
}

pub fn signed_webhook_at(body: &str, timestamp: i64) -> TestRequest {
    let signature = signature_header_value(SECRET, timestamp, body.as_bytes());
    unsigned_webhook(body).insert_header((SIGNATURE_HEADER, signature))
}

pub fn unsigned_webhook(body: &str) -> TestRequest {
    TestRequest::post()
        .uri("/provider/webhook")
        .insert_header(ContentType::json())
        .set_payload(body.to_string())
}

/// A real, throw-away store with the notification dispatcher wired to a [`RecordingTransport`].
pub struct TestStore {
    pub db: SqliteDatabase,
    pub producers: EventProducers,
    pub transport: RecordingTransport,
    handles: Vec<JoinHandle<()>>,
}

impl TestStore {
    pub async fn new() -> Self {
        let db = new_test_database(5).await;
        let transport = RecordingTransport::default();
        let dispatcher = NotificationDispatcher::new(
            std::sync::Arc::new(transport.clone()),
            "ops@example.com",
            Duration::from_secs(1),
        );
        let handlers = EventHandlers::new(5, dispatcher.into_hooks());
        let producers = handlers.producers();
        let handles = handlers.start_handlers();
        Self { db, producers, transport, handles }
    }

    pub fn orders_api(&self) -> OrderFlowApi<SqliteDatabase> {
        OrderFlowApi::new(self.db.clone(), self.producers.clone())
    }

    pub async fn create_order(&self, order_id: &str, total: i64) {
        let order = NewOrder::new(OrderId::new(order_id), "alice@example.com", "EUR", PaymentMethod::Card)
            .with_item(NewOrderItem::new("walnut-bookcase", Cents::from(total), 1));
        self.orders_api().create_order(order).await.expect("order is created");
    }

    pub async fn create_paid_order(&self, order_id: &str, total: i64) {
        self.create_order(order_id, total).await;
        let event =
            NewPaymentEvent::new(format!("evt_setup_{order_id}"), OrderId::new(order_id), PaymentEventKind::IntentSucceeded);
        self.orders_api().handle_payment_event(event).await.expect("order is paid");
    }

    /// Everything the server registers for the webhook, admin and lookup routes, backed by this store.
    pub fn configure(&self) -> impl FnOnce(&mut ServiceConfig) {
        let orders_api = self.orders_api();
        let refund_api = RefundApi::new(self.db.clone(), self.producers.clone());
        let tracking_api = OrderTrackingApi::new(self.db.clone());
        move |cfg: &mut ServiceConfig| {
            let signature =
                WebhookSignatureFactory::new(SIGNATURE_HEADER, Secret::new(SECRET.to_string()), Duration::from_secs(300));
            cfg.app_data(web::Data::new(orders_api))
                .app_data(web::Data::new(refund_api))
                .app_data(web::Data::new(tracking_api))
                .app_data(web::Data::new(ServerOptions::default()))
                .service(
                    web::scope("/api")
                        .service(CreateOrderRoute::<SqliteDatabase>::new())
                        .service(CancelOrderRoute::<SqliteDatabase>::new())
                        .service(AdvanceFulfilmentRoute::<SqliteDatabase>::new())
                        .service(AddOrderNoteRoute::<SqliteDatabase>::new())
                        .service(OrderDetailsRoute::<SqliteDatabase>::new())
                        .service(CreateRefundRoute::<SqliteDatabase>::new())
                        .service(ApproveRefundRoute::<SqliteDatabase>::new())
                        .service(DeclineRefundRoute::<SqliteDatabase>::new())
                        .service(ProcessRefundRoute::<SqliteDatabase>::new())
                        .service(RefundsForOrderRoute::<SqliteDatabase>::new()),
                )
                .service(web::scope("/provider").wrap(signature).service(ProviderWebhookRoute::<SqliteDatabase>::new()));
        }
    }

    /// Waits for all notifications to be delivered and removes the database. Returns the transport so that the
    /// notifications can be inspected.
    pub async fn shutdown(self) -> RecordingTransport {
        let Self { db, producers, transport, handles } = self;
        drop(producers);
        for handle in handles {
            handle.await.expect("event handler shut down cleanly");
        }
        sfp_payment_engine::test_utils::prepare_env::drop_test_database(&db).await;
        transport
    }
}
