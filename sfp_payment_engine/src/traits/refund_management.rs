use crate::{
    db_types::{Cents, NewRefund, OrderId, Refund},
    traits::{OrderManagement, PaymentGatewayError, RefundProcessed},
};

/// The refund ledger.
///
/// Implementations must hold an order-scoped write lock while validating and committing any change that increases the
/// sum of approved and processed refunds, so that concurrent operators cannot jointly refund more than the order
/// total.
#[allow(async_fn_in_trait)]
pub trait RefundManagement: OrderManagement {
    /// Creates a `pending` refund.
    ///
    /// ## Failure modes:
    /// - `ValidationError` if the reason is blank or the order has never been paid.
    /// - `OrderNotFound` if the order does not exist.
    /// - `InvalidAmount` if the amount is not positive or exceeds the refundable amount. No record is written.
    async fn create_refund(&self, refund: NewRefund) -> Result<Refund, PaymentGatewayError>;

    /// Moves a refund from `pending` to `approved`, re-checking the refund invariant inside the transaction.
    async fn approve_refund(&self, refund_id: i64) -> Result<Refund, PaymentGatewayError>;

    /// Moves a refund from `pending` to `declined`.
    async fn decline_refund(&self, refund_id: i64) -> Result<Refund, PaymentGatewayError>;

    /// Moves a refund from `approved` to `processed`. If the processed refunds now cover the full total of a paid
    /// order, the order is cancelled in the same transaction.
    async fn process_refund(&self, refund_id: i64) -> Result<RefundProcessed, PaymentGatewayError>;

    async fn fetch_refund(&self, refund_id: i64) -> Result<Option<Refund>, PaymentGatewayError>;

    async fn fetch_refunds_for_order(&self, order_id: &OrderId) -> Result<Vec<Refund>, PaymentGatewayError>;

    /// The sum of approved and processed refunds for the order.
    async fn total_refunded(&self, order_id: &OrderId) -> Result<Cents, PaymentGatewayError>;

    /// The order total less [`Self::total_refunded`].
    async fn refundable_amount(&self, order_id: &OrderId) -> Result<Cents, PaymentGatewayError>;
}
