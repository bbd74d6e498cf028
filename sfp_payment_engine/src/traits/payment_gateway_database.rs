use thiserror::Error;

use crate::{
    db_types::{Cents, NewOrder, NewPaymentEvent, Order, OrderId, OrderStatusType, RefundStatus, ValidationError},
    order_state_machine::TransitionError,
    traits::{GuardDecision, OrderManagement, OrderStatusChange, PaymentEventOutcome},
};

/// This trait defines the highest level of behaviour for backends supporting the payment reconciliation engine.
///
/// This behaviour includes:
/// * Storing new orders at checkout initiation
/// * Applying provider payment events exactly once
/// * Admin driven order status changes (cancellation and fulfilment)
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone + OrderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order, its line items and an audit entry in a single atomic transaction. The order is created
    /// with `pending_payment` status.
    ///
    /// Returns `OrderAlreadyExists` if an order with the same order id is already stored.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;

    /// The read-only idempotency check. It is a fast path only: [`Self::apply_payment_event`] repeats the check
    /// inside its transaction.
    async fn check_payment_event(
        &self,
        provider_event_id: &str,
        order_id: &OrderId,
    ) -> Result<GuardDecision, PaymentGatewayError>;

    /// Applies a payment event in one atomic unit:
    /// * The payment event record is inserted. If a record for `provider_event_id` already exists, nothing further is
    ///   done and `AlreadyProcessed` is returned.
    /// * The target order is locked and fetched. If it does not exist, the transaction is rolled back and
    ///   `OrderNotFound` is returned.
    /// * The order state machine decides the transition, which is persisted along with the payment reference and an
    ///   audit log entry.
    ///
    /// An `InvalidTransition` error rolls the whole unit back.
    async fn apply_payment_event(&self, event: NewPaymentEvent) -> Result<PaymentEventOutcome, PaymentGatewayError>;

    /// Cancels an order that is `pending_payment` or `paid`. The reason is written to the audit log.
    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<OrderStatusChange, PaymentGatewayError>;

    /// Moves an order one step along the fulfilment chain (`paid -> preparing -> shipped -> delivered`).
    async fn advance_fulfilment(
        &self,
        order_id: &OrderId,
        target: OrderStatusType,
    ) -> Result<OrderStatusChange, PaymentGatewayError>;

    /// Appends a line to the free-text notes of the order. Notes are never parsed.
    async fn append_note(&self, order_id: &OrderId, note: &str) -> Result<Order, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested refund {0} does not exist")]
    RefundNotFound(i64),
    #[error("{0}")]
    InvalidTransition(#[from] TransitionError),
    #[error("Refund #{id} cannot move from '{from}' to '{to}'")]
    InvalidRefundTransition { id: i64, from: RefundStatus, to: RefundStatus },
    #[error("Invalid refund amount {requested}. The refundable amount is {refundable}")]
    InvalidAmount { requested: Cents, refundable: Cents },
    #[error("Validation failed. {0}")]
    ValidationError(#[from] ValidationError),
    #[error("Refunds for order {order_id} would total {committed}, exceeding the order total of {total}")]
    InvariantViolation { order_id: OrderId, committed: Cents, total: Cents },
}

impl PaymentGatewayError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(ValidationError::new(msg))
    }

    /// Persistence failures are the only errors that a retry could fix.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DatabaseError(_))
    }
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
