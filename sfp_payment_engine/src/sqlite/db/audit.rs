use sqlx::SqliteConnection;

use crate::db_types::{AuditLogEntry, OrderId};

/// Appends an entry to the audit log for the order. Call this inside the transaction that made the change.
pub async fn append(order_id: &OrderId, entry: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO order_audit_log (order_id, entry) VALUES ($1, $2)")
        .bind(order_id.as_str())
        .bind(entry)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_for_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_audit_log WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}
