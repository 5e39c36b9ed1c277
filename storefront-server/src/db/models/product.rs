//! Product Model

use super::serde_helpers;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;
use validator::Validate;

/// Product model matching the product table
///
/// `stock_quantity` must never go negative; it is mutated only through
/// the order creation transaction or an explicit admin update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub description: String,
    pub unit_price: Decimal,
    pub barcode: String,
    pub category: String,
    pub stock_quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub available: bool,
}

/// Create product payload
///
/// Barcode must be unique across products.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProductCreate {
    #[validate(length(min = 1, message = "description must not be empty"))]
    pub description: String,
    pub unit_price: Decimal,
    #[validate(length(min = 1, message = "barcode must not be empty"))]
    pub barcode: String,
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub category: String,
    #[validate(range(min = 0, message = "stock_quantity must not be negative"))]
    pub stock_quantity: i64,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_true")]
    pub available: bool,
}

fn default_true() -> bool {
    true
}

/// Partial update payload — only provided fields are applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

/// Filters for listing products
#[derive(Debug, Clone, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub available: Option<bool>,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
            category: None,
            min_price: None,
            max_price: None,
            available: None,
        }
    }
}

fn default_limit() -> i64 {
    10
}
