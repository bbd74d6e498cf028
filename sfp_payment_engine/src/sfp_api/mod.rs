//! # Payment reconciliation public API
//!
//! The `sfp_api` module exposes the programmatic API for the payment reconciliation engine.
//! The API is modular, so that clients of the API can pick and choose the functionality they want.
//!
//! * [`order_flow_api`] is the primary API for handling order and payment flows in response to provider payment events
//!   and admin order actions.
//! * [`refund_api`] manages the refund ledger.
//! * [`order_tracking_api`] provides read access to orders, including the customer-facing order lookup.
//!
//! # API usage
//!
//! The pattern for using all the APIs is the same. An API instance is created by supplying a database backend that
//! implements the specific backend traits required by the API.
//!
//! ```rust,ignore
//! use sfp_payment_engine::{OrderTrackingApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements OrderManagement
//! let api = OrderTrackingApi::new(db);
//! let order = api.lookup_order(&order_id, "alice@example.com").await?;
//! ```

pub mod order_flow_api;
pub mod order_objects;
pub mod order_tracking_api;
pub mod refund_api;
