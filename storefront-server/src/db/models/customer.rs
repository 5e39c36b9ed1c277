//! Customer Model

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;
use validator::Validate;

/// Customer model matching the customer table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub name: String,
    pub email: String,
    pub national_id: String,
}

/// Create customer payload
///
/// Email and national id must be unique across customers.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CustomerCreate {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "national_id must not be empty"))]
    pub national_id: String,
}

/// Partial update payload — only provided fields are applied
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CustomerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email(message = "invalid email address"))]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
}

/// Filters for listing customers
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerFilter {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Default for CustomerFilter {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
            name: None,
            email: None,
        }
    }
}

fn default_limit() -> i64 {
    10
}
