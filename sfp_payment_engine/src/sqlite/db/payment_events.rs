use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{NewPaymentEvent, OrderId, PaymentEvent};

/// Inserts the payment event record. If a record with the same `provider_event_id` already exists, nothing is written
/// and `None` is returned.
///
/// This is the idempotency gate: two concurrent deliveries of the same event cannot both receive `Some`.
pub async fn try_insert(
    event: &NewPaymentEvent,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentEvent>, sqlx::Error> {
    let record: Option<PaymentEvent> = sqlx::query_as(
        r#"
            INSERT INTO payment_events (provider_event_id, order_id, kind)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider_event_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(event.provider_event_id.as_str())
    .bind(event.order_id.as_str())
    .bind(event.kind)
    .fetch_optional(conn)
    .await?;
    trace!("💳️ Payment event {} inserted: {}", event.provider_event_id, record.is_some());
    Ok(record)
}

pub async fn fetch_by_provider_id(
    provider_event_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_events WHERE provider_event_id = $1")
        .bind(provider_event_id)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_for_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<PaymentEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_events WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}

/// True if a successful payment event has been applied to the order, whatever its current status.
pub async fn has_successful_payment(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM payment_events WHERE order_id = $1 AND kind IN ('session_completed', \
         'intent_succeeded')",
    )
    .bind(order_id.as_str())
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}
