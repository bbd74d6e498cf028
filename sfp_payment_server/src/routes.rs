//! Request handler definitions
//!
//! Define each route and its handler here. The provider webhook lives in [`crate::provider_routes`].
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (I/O, database operations, etc.)
//! must be expressed as futures or asynchronous functions, so that worker threads keep serving other requests while
//! they wait.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use sfp_payment_engine::{
    db_types::{NewOrder, OrderId},
    traits::{OrderManagement, PaymentGatewayDatabase, RefundManagement},
    OrderFlowApi,
    OrderTrackingApi,
    RefundApi,
};

use crate::{
    data_objects::{CancelOrderParams, FulfilmentParams, OrderLookupRequest, OrderNoteParams, RefundRequest},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl PaymentGatewayDatabase);
/// Checkout initiation.
///
/// The storefront calls this when a customer starts checking out. The order is validated (the item subtotals must add
/// up to the order total) and stored with `pending_payment` status.
///
/// ## Returns
/// The new order object. A duplicate order id is a `409`, and an invalid order a `400`.
pub async fn create_order<B: PaymentGatewayDatabase>(
    body: web::Json<NewOrder>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = body.into_inner();
    debug!("💻️ New order request for {}", order.order_id);
    let order = api.create_order(order).await.map_err(|e| {
        debug!("💻️ Could not create order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/cancel" impl PaymentGatewayDatabase);
/// Order cancellation
///
/// Orders that have not been shipped can be cancelled. A reason is required. The customer and the operations inbox
/// are notified once the cancellation has been committed.
///
/// ## Parameters
/// * `order_id` - The order id to cancel. String.
/// * `reason` - The reason for the cancellation. String.
///
/// ## Returns
/// The status change, including the updated order.
pub async fn cancel_order<B: PaymentGatewayDatabase>(
    body: web::Json<CancelOrderParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let CancelOrderParams { order_id, reason } = body.into_inner();
    info!("💻️ Cancel order request for {order_id}. Reason: {reason}");
    let change = api.cancel_order(&order_id, &reason).await.map_err(|e| {
        debug!("💻️ Could not cancel order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(change))
}

route!(advance_fulfilment => Post "/orders/fulfilment" impl PaymentGatewayDatabase);
pub async fn advance_fulfilment<B: PaymentGatewayDatabase>(
    body: web::Json<FulfilmentParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let FulfilmentParams { order_id, status } = body.into_inner();
    info!("💻️ Fulfilment request to move {order_id} to {status}");
    let change = api.advance_fulfilment(&order_id, status).await.map_err(|e| {
        debug!("💻️ Could not update fulfilment status. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(change))
}

route!(add_order_note => Post "/orders/note" impl PaymentGatewayDatabase);
pub async fn add_order_note<B: PaymentGatewayDatabase>(
    body: web::Json<OrderNoteParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let OrderNoteParams { order_id, note } = body.into_inner();
    debug!("💻️ Add note request for {order_id}");
    let order = api.add_note(&order_id, &note).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_details => Get "/orders/{order_id}" impl OrderManagement);
/// The operator view of an order: the order itself, its items, the payment events applied to it and its audit trail.
pub async fn order_details<B: OrderManagement>(
    path: web::Path<String>,
    api: web::Data<OrderTrackingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::new(path.into_inner());
    debug!("💻️ GET order details for {order_id}");
    match api.order_details(&order_id).await? {
        Some(details) => Ok(HttpResponse::Ok().json(details)),
        None => Err(ServerError::NoRecordFound(format!("Order {order_id} does not exist"))),
    }
}

//----------------------------------------------   Customer lookup  -------------------------------------------------
route!(order_lookup => Post "/order/lookup" impl OrderManagement);
/// Customer order lookup
///
/// Customers supply their order number and the email address they checked out with. The status and items are
/// returned only when both match. Otherwise the response is a `404` that does not reveal whether the order exists.
pub async fn order_lookup<B: OrderManagement>(
    body: web::Json<OrderLookupRequest>,
    api: web::Data<OrderTrackingApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let OrderLookupRequest { order_id, email } = body.into_inner();
    trace!("💻️ Order lookup request for {order_id}");
    match api.lookup_order(&order_id, &email).await? {
        Some(result) => Ok(HttpResponse::Ok().json(result)),
        None => Err(ServerError::NoRecordFound("No order matches that order number and email address".into())),
    }
}

//----------------------------------------------   Refunds  ----------------------------------------------------
route!(create_refund => Post "/refunds" impl RefundManagement);
/// Refund request
///
/// Creates a `pending` refund against a paid (or fulfilled) order. The amount must be positive and no more than the
/// amount that is still refundable, i.e. the order total less all approved and processed refunds.
pub async fn create_refund<B: RefundManagement>(
    body: web::Json<RefundRequest>,
    api: web::Data<RefundApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    info!("💻️ Refund request for {} of {} ({})", request.order_id, request.amount, request.reason);
    let refund = api.create_refund(request.into()).await.map_err(|e| {
        debug!("💻️ Could not create refund. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(refund))
}

route!(approve_refund => Post "/refunds/{id}/approve" impl RefundManagement);
pub async fn approve_refund<B: RefundManagement>(
    path: web::Path<i64>,
    api: web::Data<RefundApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ Approve refund request for refund #{id}");
    let refund = api.approve_refund(id).await.map_err(|e| {
        debug!("💻️ Could not approve refund #{id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(refund))
}

route!(decline_refund => Post "/refunds/{id}/decline" impl RefundManagement);
pub async fn decline_refund<B: RefundManagement>(
    path: web::Path<i64>,
    api: web::Data<RefundApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ Decline refund request for refund #{id}");
    let refund = api.decline_refund(id).await?;
    Ok(HttpResponse::Ok().json(refund))
}

route!(process_refund => Post "/refunds/{id}/process" impl RefundManagement);
/// Marks an approved refund as paid out. When this completes a full refund of an order that was still `paid`, the
/// order is cancelled, and the response includes the status change.
pub async fn process_refund<B: RefundManagement>(
    path: web::Path<i64>,
    api: web::Data<RefundApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ Process refund request for refund #{id}");
    let processed = api.process_refund(id).await.map_err(|e| {
        debug!("💻️ Could not process refund #{id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(processed))
}

route!(refunds_for_order => Get "/refunds/order/{order_id}" impl RefundManagement);
pub async fn refunds_for_order<B: RefundManagement>(
    path: web::Path<String>,
    api: web::Data<RefundApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::new(path.into_inner());
    debug!("💻️ GET refunds for {order_id}");
    let summary = api.refund_summary(&order_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}
