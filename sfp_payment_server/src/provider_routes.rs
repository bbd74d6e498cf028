//! Provider webhook
//!
//! Every delivery that passes signature verification is acknowledged with a `200` unless the provider should retry it.
//! That is only the case when the unit of work could not be committed. Unknown orders, replays, invalid transitions and
//! event types we don't handle are all acknowledged (with `success: false` where something was off) so that the
//! provider stops redelivering them.
use std::time::Instant;

use actix_web::{web, HttpResponse};
use log::*;
use sfp_payment_engine::{
    traits::{PaymentEventOutcome, PaymentGatewayDatabase, PaymentGatewayError},
    OrderFlowApi,
};

use crate::{
    config::ServerOptions,
    data_objects::JsonResponse,
    errors::ServerError,
    provider_events::{ProviderEnvelope, ProviderEvent},
    route,
};

//----------------------------------------------   Webhook  ----------------------------------------------------------
route!(provider_webhook => Post "/webhook" impl PaymentGatewayDatabase);
pub async fn provider_webhook<B>(
    body: web::Bytes,
    api: web::Data<OrderFlowApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
{
    let start = Instant::now();
    let envelope = serde_json::from_slice::<ProviderEnvelope>(&body).map_err(|e| {
        warn!("🪝️ Could not parse webhook body. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    envelope.validate().map_err(|e| {
        warn!("🪝️ Rejecting webhook body. {e}");
        ServerError::InvalidRequestBody(e)
    })?;
    trace!("🪝️ Received provider event {} ({})", envelope.id, envelope.event_type);
    let result = handle_envelope(&envelope, api.as_ref()).await;
    let elapsed = start.elapsed();
    if elapsed > options.webhook_budget {
        warn!(
            "🪝️ Provider event {} took {}ms to handle, which is over the {}ms budget",
            envelope.id,
            elapsed.as_millis(),
            options.webhook_budget.as_millis()
        );
    }
    result.map(|r| HttpResponse::Ok().json(r))
}

async fn handle_envelope<B>(envelope: &ProviderEnvelope, api: &OrderFlowApi<B>) -> Result<JsonResponse, ServerError>
where B: PaymentGatewayDatabase {
    let event = envelope.to_event();
    let Some(payment) = event.to_payment_event(&envelope.id) else {
        let response = match event {
            ProviderEvent::Unrecognized(event_type) => {
                info!("🪝️ Ignoring provider event {} of type {event_type}", envelope.id);
                JsonResponse::success("Event type is not handled.")
            },
            _ => {
                warn!("🪝️ Provider event {} ({}) does not reference an order", envelope.id, envelope.event_type);
                JsonResponse::failure("The event does not reference an order.")
            },
        };
        return Ok(response);
    };
    let order_id = payment.order_id.clone();
    let response = match api.handle_payment_event(payment).await {
        Ok(PaymentEventOutcome::Applied(applied)) => {
            debug!("🪝️ Provider event {} applied to order {order_id}", envelope.id);
            JsonResponse::success(format!("Event applied. Order {order_id} is {}.", applied.order.status))
        },
        Ok(PaymentEventOutcome::AlreadyProcessed(_)) => JsonResponse::success("Event already processed."),
        Ok(PaymentEventOutcome::OrderNotFound(_)) => JsonResponse::failure(format!("Order {order_id} does not exist.")),
        Err(PaymentGatewayError::InvalidTransition(e)) => JsonResponse::failure(e.to_string()),
        Err(e) if e.is_retryable() => {
            error!("🪝️ Provider event {} could not be committed and must be retried. {e}", envelope.id);
            return Err(ServerError::BackendError(e.to_string()));
        },
        Err(e) => {
            warn!("🪝️ Unexpected error handling provider event {}. {e}", envelope.id);
            JsonResponse::failure("Unexpected error handling the event.")
        },
    };
    Ok(response)
}
