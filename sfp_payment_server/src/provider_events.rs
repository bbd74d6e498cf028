//! Payment provider event envelopes.
//!
//! The provider posts every event as `{"id": "...", "type": "...", "data": {"object": {...}}}`. The `type` string is
//! converted into a closed [`ProviderEvent`] enum here, at the boundary, so that the rest of the server only ever deals
//! with known event kinds and has to say explicitly what happens to the rest.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sfp_payment_engine::db_types::{NewPaymentEvent, OrderId, PaymentEventKind};

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EnvelopeData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeData {
    pub object: Value,
}

/// The provider-side object a payment event is about (a checkout session or a payment intent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentObject {
    /// The storefront order this payment belongs to, if the provider echoed it back.
    pub order_id: Option<OrderId>,
    /// The provider's reference for the payment, stored on the order.
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    SessionCompleted(PaymentObject),
    IntentSucceeded(PaymentObject),
    IntentFailed(PaymentObject),
    Unrecognized(String),
}

impl ProviderEnvelope {
    /// The event id is the idempotency key, so an envelope without one cannot be processed.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("The event id is blank".into());
        }
        if self.event_type.trim().is_empty() {
            return Err("The event type is blank".into());
        }
        Ok(())
    }

    pub fn to_event(&self) -> ProviderEvent {
        let object = &self.data.object;
        match self.event_type.as_str() {
            CHECKOUT_SESSION_COMPLETED => {
                // Sessions point at the intent that actually moved the money
                let reference = str_field(object, "payment_intent").or_else(|| str_field(object, "id"));
                ProviderEvent::SessionCompleted(PaymentObject { order_id: order_id(object), reference })
            },
            PAYMENT_INTENT_SUCCEEDED => {
                ProviderEvent::IntentSucceeded(PaymentObject { order_id: order_id(object), reference: str_field(object, "id") })
            },
            PAYMENT_INTENT_FAILED => {
                ProviderEvent::IntentFailed(PaymentObject { order_id: order_id(object), reference: str_field(object, "id") })
            },
            other => ProviderEvent::Unrecognized(other.to_string()),
        }
    }
}

impl ProviderEvent {
    /// The engine's view of the event kind and the object it refers to. `None` for unrecognized events.
    pub fn payment(&self) -> Option<(PaymentEventKind, &PaymentObject)> {
        match self {
            Self::SessionCompleted(obj) => Some((PaymentEventKind::SessionCompleted, obj)),
            Self::IntentSucceeded(obj) => Some((PaymentEventKind::IntentSucceeded, obj)),
            Self::IntentFailed(obj) => Some((PaymentEventKind::IntentFailed, obj)),
            Self::Unrecognized(_) => None,
        }
    }

    /// Builds the engine payment event for a recognized event that names its order.
    pub fn to_payment_event(&self, provider_event_id: &str) -> Option<NewPaymentEvent> {
        let (kind, object) = self.payment()?;
        let order_id = object.order_id.clone()?;
        let event = NewPaymentEvent::new(provider_event_id, order_id, kind);
        Some(match &object.reference {
            Some(r) => event.with_reference(r.as_str()),
            None => event,
        })
    }
}

fn str_field(object: &Value, name: &str) -> Option<String> {
    object.get(name).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

/// `metadata.order_id`, falling back to `client_reference_id`.
fn order_id(object: &Value) -> Option<OrderId> {
    object
        .get("metadata")
        .and_then(|m| str_field(m, "order_id"))
        .or_else(|| str_field(object, "client_reference_id"))
        .map(OrderId::new)
}
