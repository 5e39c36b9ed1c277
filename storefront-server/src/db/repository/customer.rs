//! Customer Repository

use super::{BaseRepository, RepoError, RepoResult, make_record_id, strip_table_prefix};
use crate::db::models::{Customer, CustomerCreate, CustomerFilter, CustomerUpdate};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const CUSTOMER_TABLE: &str = "customer";

// THROW markers parsed back out of the delete transaction's errors
const THROW_HAS_ORDERS: &str = "customer has existing orders";
const THROW_CUSTOMER_MISSING: &str = "customer not found";

#[derive(Clone)]
pub struct CustomerRepository {
    base: BaseRepository,
}

impl CustomerRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// List customers with optional name/email substring filters
    pub async fn find_all(&self, filter: CustomerFilter) -> RepoResult<Vec<Customer>> {
        let mut where_parts: Vec<&str> = Vec::new();

        if filter.name.is_some() {
            where_parts.push("string::lowercase(name) CONTAINS $name");
        }
        if filter.email.is_some() {
            where_parts.push("string::lowercase(email) CONTAINS $email");
        }

        let mut query_str = String::from("SELECT * FROM customer");
        if !where_parts.is_empty() {
            query_str.push_str(" WHERE ");
            query_str.push_str(&where_parts.join(" AND "));
        }
        query_str.push_str(" LIMIT $limit START $skip");

        let mut query = self
            .base
            .db()
            .query(query_str)
            .bind(("limit", filter.limit.max(0)))
            .bind(("skip", filter.skip.max(0)));
        if let Some(name) = filter.name {
            query = query.bind(("name", name.to_lowercase()));
        }
        if let Some(email) = filter.email {
            query = query.bind(("email", email.to_lowercase()));
        }

        let customers: Vec<Customer> = query.await?.take(0)?;
        Ok(customers)
    }

    /// Find customer by id
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Customer>> {
        let pure_id = strip_table_prefix(CUSTOMER_TABLE, id);
        let customer: Option<Customer> = self.base.db().select((CUSTOMER_TABLE, pure_id)).await?;
        Ok(customer)
    }

    /// Create a new customer
    ///
    /// Email and national id must not collide with an existing customer.
    pub async fn create(&self, data: CustomerCreate) -> RepoResult<Customer> {
        self.check_unique_fields(Some(&data.email), Some(&data.national_id), None)
            .await?;

        let customer = Customer {
            id: None,
            name: data.name,
            email: data.email,
            national_id: data.national_id,
        };

        let created: Option<Customer> = self
            .base
            .db()
            .create(CUSTOMER_TABLE)
            .content(customer)
            .await?;

        created.ok_or_else(|| RepoError::Database("Failed to create customer".to_string()))
    }

    /// Update a customer, applying only the provided fields
    pub async fn update(&self, id: &str, data: CustomerUpdate) -> RepoResult<Customer> {
        let pure_id = strip_table_prefix(CUSTOMER_TABLE, id);
        let thing = make_record_id(CUSTOMER_TABLE, pure_id);

        self.check_unique_fields(
            data.email.as_deref(),
            data.national_id.as_deref(),
            Some(&thing),
        )
        .await?;

        let mut set_parts: Vec<&str> = Vec::new();
        if data.name.is_some() {
            set_parts.push("name = $name");
        }
        if data.email.is_some() {
            set_parts.push("email = $email");
        }
        if data.national_id.is_some() {
            set_parts.push("national_id = $national_id");
        }

        if set_parts.is_empty() {
            // No fields to update
            return self
                .find_by_id(pure_id)
                .await?
                .ok_or_else(|| RepoError::NotFound(format!("Customer {} not found", id)));
        }

        let query_str = format!("UPDATE $thing SET {} RETURN AFTER", set_parts.join(", "));

        let mut query = self.base.db().query(query_str).bind(("thing", thing));
        if let Some(v) = data.name {
            query = query.bind(("name", v));
        }
        if let Some(v) = data.email {
            query = query.bind(("email", v));
        }
        if let Some(v) = data.national_id {
            query = query.bind(("national_id", v));
        }

        let mut result = query.await?.check()?;
        let customers: Vec<Customer> = result.take(0)?;

        customers
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound(format!("Customer {} not found", id)))
    }

    /// Delete a customer
    ///
    /// Restricted while any order still references the customer. The order
    /// check and the delete run in one transaction, so an order committed
    /// in between cannot end up referencing a deleted customer.
    pub async fn delete(&self, id: &str) -> RepoResult<()> {
        let pure_id = strip_table_prefix(CUSTOMER_TABLE, id);
        let thing = make_record_id(CUSTOMER_TABLE, pure_id);

        let mut response = self
            .base
            .db()
            .query(format!(
                "BEGIN TRANSACTION;\n\
                 LET $referencing = (SELECT VALUE id FROM order WHERE customer_id = $customer LIMIT 1);\n\
                 IF array::len($referencing) > 0 {{ THROW \"{THROW_HAS_ORDERS}\" }};\n\
                 LET $gone = (DELETE $customer RETURN BEFORE);\n\
                 IF array::len($gone) == 0 {{ THROW \"{THROW_CUSTOMER_MISSING}\" }};\n\
                 COMMIT TRANSACTION;"
            ))
            .bind(("customer", thing))
            .await?;

        let errors = response.take_errors();
        if errors.is_empty() {
            return Ok(());
        }

        let messages: Vec<String> = errors.into_values().map(|e| e.to_string()).collect();
        for msg in &messages {
            if msg.contains(THROW_HAS_ORDERS) {
                return Err(RepoError::Duplicate(format!(
                    "Customer {} has existing orders",
                    id
                )));
            }
            if msg.contains(THROW_CUSTOMER_MISSING) {
                return Err(RepoError::NotFound(format!("Customer {} not found", id)));
            }
        }
        Err(RepoError::Database(messages.join("; ")))
    }

    /// 检查 email / national_id 唯一性，更新时排除自身
    async fn check_unique_fields(
        &self,
        email: Option<&str>,
        national_id: Option<&str>,
        exclude: Option<&surrealdb::RecordId>,
    ) -> RepoResult<()> {
        if let Some(email) = email {
            let mut q = String::from("SELECT <string>id AS id FROM customer WHERE email = $value");
            if exclude.is_some() {
                q.push_str(" AND id != $exclude");
            }
            let mut query = self.base.db().query(q).bind(("value", email.to_string()));
            if let Some(ex) = exclude {
                query = query.bind(("exclude", ex.clone()));
            }
            let mut result = query.await?;
            let found: Vec<serde_json::Value> = result.take(0)?;
            if !found.is_empty() {
                return Err(RepoError::Duplicate(format!(
                    "email {} is already registered",
                    email
                )));
            }
        }

        if let Some(national_id) = national_id {
            let mut q =
                String::from("SELECT <string>id AS id FROM customer WHERE national_id = $value");
            if exclude.is_some() {
                q.push_str(" AND id != $exclude");
            }
            let mut query = self
                .base
                .db()
                .query(q)
                .bind(("value", national_id.to_string()));
            if let Some(ex) = exclude {
                query = query.bind(("exclude", ex.clone()));
            }
            let mut result = query.await?;
            let found: Vec<serde_json::Value> = result.take(0)?;
            if !found.is_empty() {
                return Err(RepoError::Duplicate(format!(
                    "national_id {} is already registered",
                    national_id
                )));
            }
        }

        Ok(())
    }
}
