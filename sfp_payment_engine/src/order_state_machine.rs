//! # Order state machine
//!
//! Pure transition logic for order statuses. Nothing in this module touches the database; backends call these
//! functions inside the transaction that persists the outcome.
//!
//! ```text
//! pending_payment --> paid --> preparing --> shipped --> delivered
//!        |             |
//!        +-------------+------> cancelled
//! ```
//!
//! `paid -> cancelled` covers both admin cancellation before fulfilment and a full refund of a paid order.
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{OrderStatusType, PaymentEventKind};

/// The outcome of applying an event to an order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// The status changes and the new status must be persisted.
    Changed { from: OrderStatusType, to: OrderStatusType },
    /// The event is valid but the order is already in the target state.
    NoOp,
    /// The event carries information only and never changes the status.
    Informational,
}

impl Transition {
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    pub fn new_status(&self) -> Option<OrderStatusType> {
        match self {
            Self::Changed { to, .. } => Some(*to),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    ConfirmPayment,
    Cancel,
    Fulfil(OrderStatusType),
    FullRefund,
}

impl Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfirmPayment => f.write_str("confirm payment for"),
            Self::Cancel => f.write_str("cancel"),
            Self::Fulfil(to) => write!(f, "move to '{to}'"),
            Self::FullRefund => f.write_str("fully refund"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot {action} an order with status '{from}'")]
pub struct TransitionError {
    pub from: OrderStatusType,
    pub action: OrderAction,
}

impl TransitionError {
    fn new(from: OrderStatusType, action: OrderAction) -> Self {
        Self { from, action }
    }
}

use OrderStatusType::*;

pub fn apply_payment_succeeded(current: OrderStatusType) -> Result<Transition, TransitionError> {
    match current {
        PendingPayment => Ok(Transition::Changed { from: PendingPayment, to: Paid }),
        Paid => Ok(Transition::NoOp),
        Preparing | Shipped | Delivered | Cancelled => Err(TransitionError::new(current, OrderAction::ConfirmPayment)),
    }
}

/// A failed payment attempt is only a signal. The customer may retry, so the order is never cancelled here.
pub fn apply_payment_failed(_current: OrderStatusType) -> Transition {
    Transition::Informational
}

pub fn apply_cancellation(current: OrderStatusType) -> Result<Transition, TransitionError> {
    match current {
        PendingPayment | Paid => Ok(Transition::Changed { from: current, to: Cancelled }),
        Preparing | Shipped | Delivered | Cancelled => Err(TransitionError::new(current, OrderAction::Cancel)),
    }
}

/// Admin-driven fulfilment steps. Only the next status in the chain is accepted.
pub fn apply_fulfilment_step(current: OrderStatusType, target: OrderStatusType) -> Result<Transition, TransitionError> {
    match (current, target) {
        (Paid, Preparing) | (Preparing, Shipped) | (Shipped, Delivered) => {
            Ok(Transition::Changed { from: current, to: target })
        },
        _ => Err(TransitionError::new(current, OrderAction::Fulfil(target))),
    }
}

/// Called when processed refunds reach the full order total. Only a paid order that has not entered fulfilment is
/// cancelled; refunds against goods already in fulfilment leave the order status alone.
pub fn apply_full_refund(current: OrderStatusType) -> Result<Transition, TransitionError> {
    match current {
        Paid => Ok(Transition::Changed { from: Paid, to: Cancelled }),
        Preparing | Shipped | Delivered | Cancelled => Ok(Transition::NoOp),
        PendingPayment => Err(TransitionError::new(current, OrderAction::FullRefund)),
    }
}

/// Dispatches a provider payment event to the matching transition function.
pub fn apply_payment_event(current: OrderStatusType, kind: PaymentEventKind) -> Result<Transition, TransitionError> {
    match kind {
        PaymentEventKind::SessionCompleted | PaymentEventKind::IntentSucceeded => apply_payment_succeeded(current),
        PaymentEventKind::IntentFailed => Ok(apply_payment_failed(current)),
    }
}
