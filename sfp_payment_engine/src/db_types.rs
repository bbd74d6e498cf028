//! Data types shared by the database backends and the public API.
use std::{fmt::Display, str::FromStr, sync::OnceLock};

use chrono::{DateTime, Utc};
use regex::Regex;
pub use sfp_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}")]
pub struct ConversionError(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        Self(msg.into())
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("order id (empty)".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Checkout has been initiated, but the provider has not confirmed the payment.
    PendingPayment,
    /// The provider has confirmed the payment.
    Paid,
    /// The order is being assembled in the workshop.
    Preparing,
    /// The order has left the warehouse.
    Shipped,
    /// The customer has received the order.
    Delivered,
    /// The order was cancelled before fulfilment, or was refunded in full.
    Cancelled,
}

impl OrderStatusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Paid => "paid",
            Self::Preparing => "preparing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_payment" => Ok(Self::PendingPayment),
            "paid" => Ok(Self::Paid),
            "preparing" => Ok(Self::Preparing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("order status: {s}"))),
        }
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    CashOnDelivery,
    /// Bespoke pieces that are priced by quote before payment is taken.
    QuoteOnly,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Card => "card",
            Self::BankTransfer => "bank_transfer",
            Self::CashOnDelivery => "cash_on_delivery",
            Self::QuoteOnly => "quote_only",
        };
        f.write_str(s)
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_email: String,
    pub status: OrderStatusType,
    pub total_amount: Cents,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub notes: String,
    /// The provider object (checkout session or payment intent) whose event paid this order.
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Order {} ({}) {} {} [{}]", self.order_id, self.customer_email, self.total_amount, self.currency, self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub line_no: i64,
    pub product_id: String,
    pub unit_price: Cents,
    pub quantity: i64,
    pub subtotal: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub unit_price: Cents,
    pub quantity: i64,
}

impl NewOrderItem {
    pub fn new<S: Into<String>>(product_id: S, unit_price: Cents, quantity: i64) -> Self {
        Self { product_id: product_id.into(), unit_price, quantity }
    }

    pub fn subtotal(&self) -> Option<Cents> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// An order submitted at checkout initiation. It is always stored with `pending_payment` status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub customer_email: String,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub total_amount: Cents,
    pub items: Vec<NewOrderItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"))
}

impl NewOrder {
    pub fn new(order_id: OrderId, customer_email: &str, currency: &str, payment_method: PaymentMethod) -> Self {
        Self {
            order_id,
            customer_email: customer_email.to_string(),
            currency: currency.to_string(),
            payment_method,
            total_amount: Cents::default(),
            items: Vec::new(),
            notes: None,
        }
    }

    /// Adds a line item and grows the order total by its subtotal.
    pub fn with_item(mut self, item: NewOrderItem) -> Self {
        if let Some(subtotal) = item.subtotal() {
            self.total_amount += subtotal;
        }
        self.items.push(item);
        self
    }

    pub fn with_total(mut self, total: Cents) -> Self {
        self.total_amount = total;
        self
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checks the order before it is stored. The sum of the line subtotals must equal the order total exactly.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.order_id.as_str().trim().is_empty() {
            return Err(ValidationError::new("The order id cannot be empty"));
        }
        if !email_regex().is_match(self.customer_email.trim()) {
            return Err(ValidationError::new(format!("'{}' is not a valid email address", self.customer_email)));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::new(format!("'{}' is not an ISO currency code", self.currency)));
        }
        if self.items.is_empty() {
            return Err(ValidationError::new("An order must contain at least one item"));
        }
        let mut sum = Cents::default();
        for (i, item) in self.items.iter().enumerate() {
            if item.quantity <= 0 {
                return Err(ValidationError::new(format!("Item {} has a non-positive quantity", i + 1)));
            }
            if item.unit_price.is_negative() {
                return Err(ValidationError::new(format!("Item {} has a negative unit price", i + 1)));
            }
            sum = item
                .subtotal()
                .and_then(|s| sum.checked_add(s))
                .ok_or_else(|| ValidationError::new("The order total overflows"))?;
        }
        if sum != self.total_amount {
            return Err(ValidationError::new(format!(
                "The item subtotals ({sum}) do not add up to the order total ({})",
                self.total_amount
            )));
        }
        Ok(())
    }
}

//--------------------------------------   PaymentEventKind    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    /// The hosted checkout session completed successfully.
    SessionCompleted,
    /// The payment intent behind a purchase succeeded.
    IntentSucceeded,
    /// A payment attempt failed. The customer may retry.
    IntentFailed,
}

impl PaymentEventKind {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::SessionCompleted | Self::IntentSucceeded)
    }
}

impl Display for PaymentEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SessionCompleted => "session_completed",
            Self::IntentSucceeded => "intent_succeeded",
            Self::IntentFailed => "intent_failed",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentEventKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session_completed" => Ok(Self::SessionCompleted),
            "intent_succeeded" => Ok(Self::IntentSucceeded),
            "intent_failed" => Ok(Self::IntentFailed),
            s => Err(ConversionError(format!("payment event kind: {s}"))),
        }
    }
}

//--------------------------------------     PaymentEvent      ---------------------------------------------------------
/// A record proving that the provider event `provider_event_id` has been applied.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: i64,
    pub provider_event_id: String,
    pub order_id: OrderId,
    pub kind: PaymentEventKind,
    pub processed_at: DateTime<Utc>,
}

/// An authenticated, parsed payment event that has not been applied yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPaymentEvent {
    pub provider_event_id: String,
    pub order_id: OrderId,
    pub kind: PaymentEventKind,
    pub payment_reference: Option<String>,
}

impl NewPaymentEvent {
    pub fn new<S: Into<String>>(provider_event_id: S, order_id: OrderId, kind: PaymentEventKind) -> Self {
        Self { provider_event_id: provider_event_id.into(), order_id, kind, payment_reference: None }
    }

    pub fn with_reference<S: Into<String>>(mut self, reference: S) -> Self {
        self.payment_reference = Some(reference.into());
        self
    }
}

//--------------------------------------    Refund types       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundMethod {
    /// Back to the original payment instrument.
    Original,
    Manual,
    Cash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Approved,
    Declined,
    Processed,
}

impl RefundStatus {
    /// Approved and processed refunds count against the refundable amount of an order.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Approved | Self::Processed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Declined | Self::Processed)
    }
}

impl Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Declined => "declined",
            Self::Processed => "processed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Refund {
    pub id: i64,
    pub order_id: OrderId,
    pub amount: Cents,
    pub reason: String,
    pub method: RefundMethod,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRefund {
    pub order_id: OrderId,
    pub amount: Cents,
    pub reason: String,
    pub method: RefundMethod,
}

impl NewRefund {
    pub fn new<S: Into<String>>(order_id: OrderId, amount: Cents, reason: S, method: RefundMethod) -> Self {
        Self { order_id, amount, reason: reason.into(), method }
    }
}

//--------------------------------------     AuditLogEntry     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub entry: String,
    pub created_at: DateTime<Utc>,
}
