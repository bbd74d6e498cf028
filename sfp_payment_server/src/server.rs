use std::{sync::Arc, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::{
    future::{join_all, ok},
    FutureExt,
};
use log::*;
use sfp_payment_engine::{
    events::{EventHandlers, EventProducers},
    OrderFlowApi,
    OrderTrackingApi,
    RefundApi,
    SqliteDatabase,
};

use crate::{
    config::{NotificationConfig, ServerConfig, ServerOptions},
    errors::{AuthError, ServerError, ServerError::AuthenticationError},
    helpers::get_remote_ip,
    middleware::WebhookSignatureFactory,
    notifications::{HttpRelayTransport, LogTransport, NotificationDispatcher, NotificationTransport},
    provider_routes::ProviderWebhookRoute,
    routes::{
        health,
        AddOrderNoteRoute,
        AdvanceFulfilmentRoute,
        ApproveRefundRoute,
        CancelOrderRoute,
        CreateOrderRoute,
        CreateRefundRoute,
        DeclineRefundRoute,
        OrderDetailsRoute,
        OrderLookupRoute,
        ProcessRefundRoute,
        RefundsForOrderRoute,
    },
};

const MAX_DB_CONNECTIONS: u32 = 25;
const NOTIFICATION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    config.validate()?;
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
    info!("🗃️ Database is ready at {}", config.database_url);

    let transport = notification_transport(&config.notifications)?;
    info!("📣️ Notifications will be sent with the {} transport", transport.name());
    let dispatcher =
        NotificationDispatcher::new(transport, &config.notifications.operator_email, config.notifications.timeout);
    let handlers = EventHandlers::new(config.event_buffer_size, dispatcher.into_hooks());
    let producers = handlers.producers();
    let handles = handlers.start_handlers();

    let srv = create_server_instance(config, db, producers)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    info!("📣️ Waiting for outstanding notifications to be sent");
    if tokio::time::timeout(NOTIFICATION_DRAIN_TIMEOUT, join_all(handles)).await.is_err() {
        warn!("📣️ Some notifications were still outstanding at shutdown and have been dropped");
    }
    result
}

fn notification_transport(config: &NotificationConfig) -> Result<Arc<dyn NotificationTransport>, ServerError> {
    match &config.relay_url {
        Some(url) => {
            let transport = HttpRelayTransport::new(url, config.timeout)
                .map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
            Ok(Arc::new(transport))
        },
        None => Ok(Arc::new(LogTransport)),
    }
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let refund_api = RefundApi::new(db.clone(), producers.clone());
        let tracking_api = OrderTrackingApi::new(db.clone());
        let options = ServerOptions::from_config(&config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sfp::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(refund_api))
            .app_data(web::Data::new(tracking_api))
            .app_data(web::Data::new(options));
        let api_scope = web::scope("/api")
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(AdvanceFulfilmentRoute::<SqliteDatabase>::new())
            .service(AddOrderNoteRoute::<SqliteDatabase>::new())
            .service(OrderDetailsRoute::<SqliteDatabase>::new())
            .service(CreateRefundRoute::<SqliteDatabase>::new())
            .service(ApproveRefundRoute::<SqliteDatabase>::new())
            .service(DeclineRefundRoute::<SqliteDatabase>::new())
            .service(ProcessRefundRoute::<SqliteDatabase>::new())
            .service(RefundsForOrderRoute::<SqliteDatabase>::new());
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let whitelist = config.webhook.whitelist.clone();
        let signature = WebhookSignatureFactory::new(
            &config.webhook.signature_header,
            config.webhook.secret.clone(),
            config.webhook.tolerance,
        );
        let provider_scope = web::scope("/provider")
            .wrap(signature)
            .wrap_fn(move |req, srv| {
                let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
                let allowed = match (peer_ip, &whitelist) {
                    (_, None) => true,
                    (Some(ip), Some(whitelist)) => {
                        trace!("🪝️ Provider webhook from {ip}");
                        whitelist.contains(&ip)
                    },
                    (None, Some(_)) => {
                        warn!("🪝️ No IP address found in provider webhook request, denying access.");
                        false
                    },
                };
                if allowed {
                    srv.call(req).boxed_local()
                } else {
                    warn!("🪝️ Provider webhook from {peer_ip:?} is not on the whitelist, denying access.");
                    ok(req.error_response(AuthenticationError(AuthError::ForbiddenPeer))).boxed_local()
                }
            })
            .service(ProviderWebhookRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(OrderLookupRoute::<SqliteDatabase>::new())
            .service(api_scope)
            .service(provider_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
