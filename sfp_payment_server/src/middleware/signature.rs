//! Webhook signature middleware for Actix Web.
//!
//! The payment provider signs every webhook with a shared secret. The signature travels in a header (by default
//! `Stripe-Signature`) of the form `t=<unix-ts>,v1=<hex>`, where the hex value is the HMAC-SHA256 of
//! `"{t}.{raw_body}"`. See [`crate::helpers::verify_signature`].
//!
//! Wrap the webhook scope with this middleware. Requests that fail verification never reach the handler. The body is
//! read to verify it and then put back so that the handler can read it again.

use std::{
    future::{ready, Ready},
    rc::Rc,
    time::Duration,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use sfp_common::Secret;

use crate::{
    errors::{AuthError, ServerError},
    helpers::verify_signature,
};

pub struct WebhookSignatureFactory {
    signature_header: String,
    secret: Secret<String>,
    tolerance: Duration,
}

impl WebhookSignatureFactory {
    pub fn new(signature_header: &str, secret: Secret<String>, tolerance: Duration) -> Self {
        WebhookSignatureFactory { signature_header: signature_header.into(), secret, tolerance }
    }
}

impl<S, B> Transform<S, ServiceRequest> for WebhookSignatureFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = WebhookSignatureService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WebhookSignatureService {
            signature_header: self.signature_header.clone(),
            secret: self.secret.clone(),
            tolerance: self.tolerance,
            service: Rc::new(service),
        }))
    }
}

pub struct WebhookSignatureService<S> {
    signature_header: String,
    secret: Secret<String>,
    tolerance: Duration,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for WebhookSignatureService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.secret.clone();
        let signature_header = self.signature_header.clone();
        let tolerance = self.tolerance;
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature");
            if secret.is_empty() {
                warn!("🔐️ No webhook secret is configured. Refusing the webhook call.");
                let err = ServerError::ConfigurationError("The webhook secret is not configured".into());
                return Err(err.into());
            }
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {e:?}");
                ServerError::InvalidRequestBody("Failed to extract request data.".into())
            })?;
            let peer = req.peer_addr().map(|a| a.to_string()).unwrap_or_else(|| "unknown".into());
            let Some(header) = req.headers().get(&signature_header).and_then(|h| h.to_str().ok()) else {
                warn!("🔐️ No webhook signature found in request from {peer}. {}. Denying access.", describe(&data));
                return Err(ServerError::from(AuthError::MissingSignature).into());
            };
            let now = chrono::Utc::now().timestamp();
            match verify_signature(secret.reveal(), header, data.as_ref(), tolerance, now) {
                Ok(()) => {
                    trace!("🔐️ Webhook signature check ✅️");
                    req.set_payload(bytes_to_payload(data));
                    service.call(req).await
                },
                Err(e) => {
                    warn!("🔐️ Webhook from {peer} failed signature verification. {e} {}. Denying access.", describe(&data));
                    Err(ServerError::from(e).into())
                },
            }
        })
    }
}

/// Identifying metadata for log messages. The body itself is never logged.
fn describe(body: &[u8]) -> String {
    let value = serde_json::from_slice::<serde_json::Value>(body).ok();
    let field = |name: &str| value.as_ref().and_then(|v| v.get(name)).and_then(|v| v.as_str()).unwrap_or("?").to_string();
    format!("Event id: {}, type: {}, body length: {}", field("id"), field("type"), body.len())
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
