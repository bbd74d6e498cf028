use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderStatusType},
    traits::PaymentGatewayError,
};

/// Inserts a new order and its line items using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// Returns `None` if an order with the same `order_id` already exists.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let inserted: Option<Order> = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                customer_email,
                total_amount,
                currency,
                payment_method,
                notes
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(order.customer_email.trim())
    .bind(order.total_amount)
    .bind(order.currency.to_ascii_uppercase())
    .bind(order.payment_method)
    .bind(order.notes.clone().unwrap_or_default())
    .fetch_optional(&mut *conn)
    .await?;
    let Some(inserted) = inserted else {
        return Ok(None);
    };
    for (i, item) in order.items.iter().enumerate() {
        let subtotal = item.unit_price * item.quantity;
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, line_no, product_id, unit_price, quantity, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.order_id.as_str())
        .bind(i as i64 + 1)
        .bind(item.product_id.as_str())
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(subtotal)
        .execute(&mut *conn)
        .await?;
    }
    debug!("📝️ Order [{}] inserted with id {} and {} items", inserted.order_id, inserted.id, order.items.len());
    Ok(Some(inserted))
}

/// Returns the entry in the orders table for the corresponding `order_id`
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Takes the database write lock on behalf of the enclosing transaction and returns the current order record.
pub async fn lock_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    trace!("📝️ Locking order {order_id}");
    sqlx::query_as("UPDATE orders SET updated_at = updated_at WHERE order_id = $1 RETURNING *")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await
}

/// As [`lock_order`], for the order that the given refund belongs to.
pub async fn lock_order_for_refund(refund_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    trace!("📝️ Locking order for refund #{refund_id}");
    sqlx::query_as(
        r#"
        UPDATE orders SET updated_at = updated_at
        WHERE order_id = (SELECT order_id FROM refunds WHERE id = $1)
        RETURNING *
        "#,
    )
    .bind(refund_id)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_order_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as(
        "SELECT line_no, product_id, unit_price, quantity, subtotal FROM order_items WHERE order_id = $1 ORDER BY \
         line_no ASC",
    )
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await
}

/// Sets the status of the order. When a payment reference is given it replaces the stored one, otherwise the stored
/// reference is kept.
pub(crate) async fn update_order_status(
    id: i64,
    status: OrderStatusType,
    payment_reference: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            status = $1,
            payment_reference = COALESCE($2, payment_reference),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(status)
    .bind(payment_reference)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| PaymentGatewayError::DatabaseError(format!("Order with internal id {id} vanished")))
}

pub(crate) async fn append_note(id: i64, note: &str, conn: &mut SqliteConnection) -> Result<Order, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET
            notes = CASE WHEN notes = '' THEN $1 ELSE notes || char(10) || $1 END,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(note)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| PaymentGatewayError::DatabaseError(format!("Order with internal id {id} vanished")))
}
