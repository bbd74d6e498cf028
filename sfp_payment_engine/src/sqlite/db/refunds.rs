use sqlx::SqliteConnection;

use crate::db_types::{Cents, NewRefund, OrderId, Refund, RefundStatus};

pub async fn insert_refund(refund: &NewRefund, conn: &mut SqliteConnection) -> Result<Refund, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO refunds (order_id, amount, reason, method)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(refund.order_id.as_str())
    .bind(refund.amount)
    .bind(refund.reason.trim())
    .bind(refund.method)
    .fetch_one(conn)
    .await
}

pub async fn fetch_refund(id: i64, conn: &mut SqliteConnection) -> Result<Option<Refund>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM refunds WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_refunds_for_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<Refund>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM refunds WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}

/// The sum of refunds with the given statuses for the order.
async fn sum_for_statuses(
    order_id: &OrderId,
    statuses: &[RefundStatus],
    conn: &mut SqliteConnection,
) -> Result<Cents, sqlx::Error> {
    let refunds = fetch_refunds_for_order(order_id, conn).await?;
    Ok(refunds.iter().filter(|r| statuses.contains(&r.status)).map(|r| r.amount).sum())
}

/// The sum of approved and processed refunds. This is the amount that counts against the order total.
pub async fn committed_total(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Cents, sqlx::Error> {
    sum_for_statuses(order_id, &[RefundStatus::Approved, RefundStatus::Processed], conn).await
}

pub async fn processed_total(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Cents, sqlx::Error> {
    sum_for_statuses(order_id, &[RefundStatus::Processed], conn).await
}

pub async fn update_status(id: i64, status: RefundStatus, conn: &mut SqliteConnection) -> Result<Refund, sqlx::Error> {
    sqlx::query_as("UPDATE refunds SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
        .bind(status)
        .bind(id)
        .fetch_one(conn)
        .await
}
