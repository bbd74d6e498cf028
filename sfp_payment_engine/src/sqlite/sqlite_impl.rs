//! `SqliteDatabase` is a concrete implementation of a payment reconciliation backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{audit, db_url, new_pool, orders, payment_events, refunds};
use crate::{
    db_types::{
        AuditLogEntry,
        Cents,
        NewOrder,
        NewPaymentEvent,
        NewRefund,
        Order,
        OrderId,
        OrderItem,
        OrderStatusType,
        PaymentEvent,
        Refund,
        RefundStatus,
    },
    order_state_machine::{self, Transition},
    traits::{
        AppliedPaymentEvent,
        GuardDecision,
        OrderManagement,
        OrderStatusChange,
        PaymentEventOutcome,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        RefundManagement,
        RefundProcessed,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let inserted = orders::insert_order(&order, &mut tx)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderAlreadyExists(order.order_id.clone()))?;
        let entry = format!(
            "Order created for {} with {} item(s), total {} {}",
            inserted.payment_method,
            order.items.len(),
            inserted.total_amount,
            inserted.currency
        );
        audit::append(&inserted.order_id, &entry, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} has been saved in the DB with id {}", inserted.order_id, inserted.id);
        Ok(inserted)
    }

    async fn check_payment_event(
        &self,
        provider_event_id: &str,
        order_id: &OrderId,
    ) -> Result<GuardDecision, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        if payment_events::fetch_by_provider_id(provider_event_id, &mut conn).await?.is_some() {
            return Ok(GuardDecision::AlreadyProcessed);
        }
        match orders::fetch_order_by_order_id(order_id, &mut conn).await? {
            Some(_) => Ok(GuardDecision::Proceed),
            None => Ok(GuardDecision::OrderNotFound),
        }
    }

    async fn apply_payment_event(&self, event: NewPaymentEvent) -> Result<PaymentEventOutcome, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let Some(record) = payment_events::try_insert(&event, &mut tx).await? else {
            tx.rollback().await?;
            debug!("🗃️ Payment event {} was already applied", event.provider_event_id);
            return Ok(PaymentEventOutcome::AlreadyProcessed(event.provider_event_id));
        };
        let Some(order) = orders::lock_order(&event.order_id, &mut tx).await? else {
            tx.rollback().await?;
            debug!("🗃️ Payment event {} refers to unknown order {}", event.provider_event_id, event.order_id);
            return Ok(PaymentEventOutcome::OrderNotFound(event.order_id));
        };
        // An invalid transition drops the transaction, which rolls back the event record too
        let transition = order_state_machine::apply_payment_event(order.status, event.kind)?;
        let order = match transition {
            Transition::Changed { to, .. } => {
                orders::update_order_status(order.id, to, event.payment_reference.as_deref(), &mut tx).await?
            },
            Transition::NoOp | Transition::Informational => order,
        };
        let entry = match transition {
            Transition::Changed { from, to } => {
                format!("Payment event {} ({}) moved the order from {from} to {to}", record.provider_event_id, record.kind)
            },
            Transition::NoOp => {
                format!("Payment event {} ({}) recorded. Order already {}", record.provider_event_id, record.kind, order.status)
            },
            Transition::Informational => {
                format!("Payment event {} ({}) recorded. Payment attempt failed", record.provider_event_id, record.kind)
            },
        };
        audit::append(&order.order_id, &entry, &mut tx).await?;
        tx.commit().await?;
        trace!("🗃️ {entry}");
        Ok(PaymentEventOutcome::Applied(AppliedPaymentEvent { event: record, order, transition }))
    }

    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<OrderStatusChange, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::lock_order(order_id, &mut tx).await?.ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        let transition = order_state_machine::apply_cancellation(order.status)?;
        let change = self.persist_transition(order, transition, &format!("Order cancelled. {reason}"), &mut tx).await?;
        tx.commit().await?;
        Ok(change)
    }

    async fn advance_fulfilment(
        &self,
        order_id: &OrderId,
        target: OrderStatusType,
    ) -> Result<OrderStatusChange, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::lock_order(order_id, &mut tx).await?.ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        let transition = order_state_machine::apply_fulfilment_step(order.status, target)?;
        let change = self.persist_transition(order, transition, "Fulfilment status updated", &mut tx).await?;
        tx.commit().await?;
        Ok(change)
    }

    async fn append_note(&self, order_id: &OrderId, note: &str) -> Result<Order, PaymentGatewayError> {
        let note = note.trim();
        if note.is_empty() {
            return Err(PaymentGatewayError::validation("A note cannot be empty"));
        }
        let mut tx = self.pool.begin().await?;
        let order =
            orders::lock_order(order_id, &mut tx).await?.ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        let order = orders::append_note(order.id, note, &mut tx).await?;
        audit::append(order_id, "Note added", &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_payment_event(&self, provider_event_id: &str) -> Result<Option<PaymentEvent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let event = payment_events::fetch_by_provider_id(provider_event_id, &mut conn).await?;
        Ok(event)
    }

    async fn fetch_payment_events_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<PaymentEvent>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let events = payment_events::fetch_for_order(order_id, &mut conn).await?;
        Ok(events)
    }

    async fn fetch_audit_log(&self, order_id: &OrderId) -> Result<Vec<AuditLogEntry>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let entries = audit::fetch_for_order(order_id, &mut conn).await?;
        Ok(entries)
    }
}

impl RefundManagement for SqliteDatabase {
    async fn create_refund(&self, refund: NewRefund) -> Result<Refund, PaymentGatewayError> {
        if refund.reason.trim().is_empty() {
            return Err(PaymentGatewayError::validation("A refund must have a reason"));
        }
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_order(&refund.order_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(refund.order_id.clone()))?;
        // Refunds follow the charge, not the status. An order cancelled before payment has nothing to refund.
        let charged = order.payment_reference.is_some()
            || payment_events::has_successful_payment(&order.order_id, &mut tx).await?;
        if !charged {
            return Err(PaymentGatewayError::validation(format!(
                "Order {} has not been paid, so there is nothing to refund",
                order.order_id
            )));
        }
        let refundable = order.total_amount - refunds::committed_total(&order.order_id, &mut tx).await?;
        if !refund.amount.is_positive() || refund.amount > refundable {
            return Err(PaymentGatewayError::InvalidAmount { requested: refund.amount, refundable });
        }
        let created = refunds::insert_refund(&refund, &mut tx).await?;
        let entry = format!("Refund #{} for {} requested ({:?}). {}", created.id, created.amount, created.method, created.reason);
        audit::append(&order.order_id, &entry, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Refund #{} of {} created for order {}", created.id, created.amount, created.order_id);
        Ok(created)
    }

    async fn approve_refund(&self, refund_id: i64) -> Result<Refund, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let (order, refund) = lock_refund(refund_id, &mut tx).await?;
        check_refund_transition(&refund, RefundStatus::Pending, RefundStatus::Approved)?;
        let committed = refunds::committed_total(&order.order_id, &mut tx).await? + refund.amount;
        if committed > order.total_amount {
            return Err(PaymentGatewayError::InvariantViolation {
                order_id: order.order_id,
                committed,
                total: order.total_amount,
            });
        }
        let refund = refunds::update_status(refund_id, RefundStatus::Approved, &mut tx).await?;
        audit::append(&order.order_id, &format!("Refund #{refund_id} approved"), &mut tx).await?;
        tx.commit().await?;
        Ok(refund)
    }

    async fn decline_refund(&self, refund_id: i64) -> Result<Refund, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let (order, refund) = lock_refund(refund_id, &mut tx).await?;
        check_refund_transition(&refund, RefundStatus::Pending, RefundStatus::Declined)?;
        let refund = refunds::update_status(refund_id, RefundStatus::Declined, &mut tx).await?;
        audit::append(&order.order_id, &format!("Refund #{refund_id} declined"), &mut tx).await?;
        tx.commit().await?;
        Ok(refund)
    }

    async fn process_refund(&self, refund_id: i64) -> Result<RefundProcessed, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let (order, refund) = lock_refund(refund_id, &mut tx).await?;
        check_refund_transition(&refund, RefundStatus::Approved, RefundStatus::Processed)?;
        // The refund being processed is already part of the committed total
        let committed = refunds::committed_total(&order.order_id, &mut tx).await?;
        if committed > order.total_amount {
            error!(
                "🗃️ Refunds for order {} total {committed}, which exceeds the order total of {}. Refusing to process \
                 refund #{refund_id}",
                order.order_id, order.total_amount
            );
            return Err(PaymentGatewayError::InvariantViolation {
                order_id: order.order_id,
                committed,
                total: order.total_amount,
            });
        }
        let refund = refunds::update_status(refund_id, RefundStatus::Processed, &mut tx).await?;
        audit::append(&order.order_id, &format!("Refund #{refund_id} processed"), &mut tx).await?;
        let processed = refunds::processed_total(&order.order_id, &mut tx).await?;
        let order_change = if processed == order.total_amount {
            let transition = order_state_machine::apply_full_refund(order.status)?;
            match transition {
                Transition::Changed { .. } => {
                    let change = self.persist_transition(order, transition, "Order refunded in full", &mut tx).await?;
                    Some(change)
                },
                Transition::NoOp | Transition::Informational => None,
            }
        } else {
            None
        };
        tx.commit().await?;
        Ok(RefundProcessed { refund, order_change })
    }

    async fn fetch_refund(&self, refund_id: i64) -> Result<Option<Refund>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let refund = refunds::fetch_refund(refund_id, &mut conn).await?;
        Ok(refund)
    }

    async fn fetch_refunds_for_order(&self, order_id: &OrderId) -> Result<Vec<Refund>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = refunds::fetch_refunds_for_order(order_id, &mut conn).await?;
        Ok(result)
    }

    async fn total_refunded(&self, order_id: &OrderId) -> Result<Cents, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let total = refunds::committed_total(order_id, &mut conn).await?;
        Ok(total)
    }

    async fn refundable_amount(&self, order_id: &OrderId) -> Result<Cents, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        let committed = refunds::committed_total(order_id, &mut conn).await?;
        Ok(order.total_amount - committed)
    }
}

/// Locks the order that owns the refund and returns both records.
async fn lock_refund(
    refund_id: i64,
    conn: &mut sqlx::SqliteConnection,
) -> Result<(Order, Refund), PaymentGatewayError> {
    let order = orders::lock_order_for_refund(refund_id, conn).await?.ok_or(PaymentGatewayError::RefundNotFound(refund_id))?;
    let refund = refunds::fetch_refund(refund_id, conn).await?.ok_or(PaymentGatewayError::RefundNotFound(refund_id))?;
    Ok((order, refund))
}

fn check_refund_transition(refund: &Refund, from: RefundStatus, to: RefundStatus) -> Result<(), PaymentGatewayError> {
    if refund.status == from {
        Ok(())
    } else {
        Err(PaymentGatewayError::InvalidRefundTransition { id: refund.id, from: refund.status, to })
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Runs the embedded migrations against this database.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn persist_transition(
        &self,
        order: Order,
        transition: Transition,
        entry: &str,
        conn: &mut sqlx::SqliteConnection,
    ) -> Result<OrderStatusChange, PaymentGatewayError> {
        let Transition::Changed { from, to } = transition else {
            return Err(PaymentGatewayError::DatabaseError(format!(
                "Expected a status change for order {}, but got {transition:?}",
                order.order_id
            )));
        };
        let order = orders::update_order_status(order.id, to, None, conn).await?;
        audit::append(&order.order_id, &format!("{entry} ({from} -> {to})"), conn).await?;
        Ok(OrderStatusChange { from, to, order })
    }
}
