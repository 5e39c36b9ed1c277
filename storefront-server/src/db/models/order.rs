//! Order Model
//!
//! An order is always handled as an aggregate: the header row plus its
//! full set of lines, created, read and deleted as one unit.

use super::serde_helpers;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Order header row as stored in the order table
///
/// `created_at` is stored as epoch milliseconds and set exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    #[serde(with = "serde_helpers::record_id")]
    pub customer_id: RecordId,
    pub status: String,
    pub created_at: i64,
}

/// One line of a create-order request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineCreate {
    pub product_id: String,
    pub quantity: i64,
}

/// Create order payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreate {
    pub customer_id: String,
    pub lines: Vec<OrderLineCreate>,
}

/// Update order payload — status is a plain field replacement.
/// Any string is accepted; no transition table is enforced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Resolved line item of a persisted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: String,
    pub quantity: i64,
}

/// Fully materialized order aggregate (header + line items)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLineItem>,
}

/// Filters for listing orders, all optional and combinable
///
/// `status` and `category` are case-insensitive substring matches;
/// the date bounds are inclusive on both ends.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub id: Option<String>,
    pub customer_id: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}
