//! Order Repository (Order Workflow)
//!
//! Order creation runs as one multi-statement SurrealQL transaction:
//! customer check, per-line product and stock checks, stock decrements,
//! header and line creation. Any failed check THROWs, which aborts the
//! whole transaction — no partial stock decrement can ever be observed.
//!
//! Concurrent reservations against the same product serialize on the
//! storage engine's optimistic transactions; commit conflicts are
//! retried a bounded number of times before giving up.

use super::{BaseRepository, RepoError, RepoResult, make_record_id};
use crate::db::models::{Order, OrderCreate, OrderDetail, OrderFilter, OrderLineItem, OrderUpdate};
use chrono::{DateTime, Utc};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const ORDER_TABLE: &str = "order";
const PRODUCT_TABLE: &str = "product";
const CUSTOMER_TABLE: &str = "customer";

/// Initial status of every persisted order
const STATUS_PENDING: &str = "pending";

/// Commit conflict retries before the request is failed
const MAX_COMMIT_ATTEMPTS: u32 = 8;

// THROW markers parsed back out of transaction errors
const THROW_CUSTOMER_NOT_FOUND: &str = "customer not found";
const THROW_PRODUCT_NOT_FOUND: &str = "product not found: ";
const THROW_INSUFFICIENT_STOCK: &str = "insufficient stock: ";

/// Materialize the aggregate from a header row and its resolved lines
fn to_detail(order: Order, lines: Vec<OrderLineItem>) -> OrderDetail {
    OrderDetail {
        id: order.id.as_ref().map(|t| t.to_string()).unwrap_or_default(),
        customer_id: order.customer_id.to_string(),
        status: order.status,
        created_at: DateTime::<Utc>::from_timestamp_millis(order.created_at)
            .unwrap_or_else(Utc::now),
        lines,
    }
}

#[derive(Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Create an order aggregate (header + lines) with stock reservation
    ///
    /// All-or-nothing: the customer check, every line's product and stock
    /// check, the stock decrements and the row creations run in a single
    /// transaction. Validation failures surface as typed errors with zero
    /// side effects.
    pub async fn create(&self, data: OrderCreate) -> RepoResult<OrderDetail> {
        if data.lines.is_empty() {
            return Err(RepoError::Validation(
                "order must contain at least one line".into(),
            ));
        }
        for line in &data.lines {
            if line.quantity < 1 {
                return Err(RepoError::Validation(
                    "line quantity must be at least 1".into(),
                ));
            }
        }
        // 同一商品重复行会破坏 (order_id, product_id) 复合唯一键
        for (i, line) in data.lines.iter().enumerate() {
            if data.lines[..i].iter().any(|l| l.product_id == line.product_id) {
                return Err(RepoError::Validation(format!(
                    "duplicate line for product {}",
                    line.product_id
                )));
            }
        }

        let customer = make_record_id(CUSTOMER_TABLE, &data.customer_id);
        let order_key = uuid::Uuid::new_v4().simple().to_string();
        let order_id = RecordId::from_table_key(ORDER_TABLE, order_key.clone());
        let created_at = Utc::now().timestamp_millis();

        let query_str = Self::build_create_query(data.lines.len());

        let mut attempt = 0u32;
        loop {
            let mut query = self
                .base
                .db()
                .query(query_str.clone())
                .bind(("customer_id", customer.clone()))
                .bind(("order_id", order_id.clone()))
                .bind(("status", STATUS_PENDING))
                .bind(("created_at", created_at));
            for (i, line) in data.lines.iter().enumerate() {
                query = query
                    .bind((
                        format!("product_id_{i}"),
                        make_record_id(PRODUCT_TABLE, &line.product_id),
                    ))
                    .bind((format!("quantity_{i}"), line.quantity));
            }

            // Commit conflicts can surface either as a response error set or
            // as a top-level query error; both go through the same mapping.
            let messages: Vec<String> = match query.await {
                Ok(mut response) => {
                    let errors = response.take_errors();
                    if errors.is_empty() {
                        break;
                    }
                    errors.into_values().map(|e| e.to_string()).collect()
                }
                Err(e) => vec![e.to_string()],
            };
            let mapped = Self::map_transaction_errors(&messages);

            match mapped {
                RepoError::Database(ref msg) if is_commit_conflict(msg) => {
                    attempt += 1;
                    if attempt >= MAX_COMMIT_ATTEMPTS {
                        return Err(RepoError::Database(format!(
                            "order creation kept conflicting after {MAX_COMMIT_ATTEMPTS} attempts: {msg}"
                        )));
                    }
                    tracing::debug!(attempt, "order creation commit conflict, retrying");
                    tokio::time::sleep(std::time::Duration::from_millis(10 * attempt as u64))
                        .await;
                }
                err => return Err(err),
            }
        }

        self.get_detail(&order_key)
            .await?
            .ok_or_else(|| RepoError::Database("Order vanished after creation".to_string()))
    }

    /// Build the create-order transaction for `line_count` lines
    fn build_create_query(line_count: usize) -> String {
        let mut q = String::from("BEGIN TRANSACTION;\n");
        q.push_str("LET $customer = (SELECT * FROM $customer_id);\n");
        q.push_str(&format!(
            "IF array::len($customer) == 0 {{ THROW \"{THROW_CUSTOMER_NOT_FOUND}\" }};\n"
        ));
        // 先校验全部行，再应用扣减
        for i in 0..line_count {
            q.push_str(&format!(
                "LET $product_{i} = (SELECT * FROM $product_id_{i});\n"
            ));
            q.push_str(&format!(
                "IF array::len($product_{i}) == 0 {{ THROW \"{THROW_PRODUCT_NOT_FOUND}\" + <string>$product_id_{i} }};\n"
            ));
            q.push_str(&format!(
                "IF $product_{i}[0].stock_quantity < $quantity_{i} {{ THROW \"{THROW_INSUFFICIENT_STOCK}\" + <string>$product_id_{i} }};\n"
            ));
        }
        for i in 0..line_count {
            q.push_str(&format!(
                "UPDATE $product_id_{i} SET stock_quantity -= $quantity_{i};\n"
            ));
        }
        q.push_str(
            "CREATE $order_id SET customer_id = $customer_id, status = $status, created_at = $created_at;\n",
        );
        for i in 0..line_count {
            q.push_str(&format!(
                "CREATE order_line SET order_id = $order_id, product_id = $product_id_{i}, quantity = $quantity_{i};\n"
            ));
        }
        q.push_str("COMMIT TRANSACTION;");
        q
    }

    /// Map the error set of an aborted transaction back to a typed error
    ///
    /// Every statement of an aborted transaction reports a generic
    /// "query was not executed" error; the THROWing statement carries the
    /// marker message we planted.
    fn map_transaction_errors(messages: &[String]) -> RepoError {
        for msg in messages {
            if msg.contains(THROW_CUSTOMER_NOT_FOUND) {
                return RepoError::NotFound("Customer not found".to_string());
            }
            if let Some(rest) = msg.split(THROW_PRODUCT_NOT_FOUND).nth(1) {
                let product = rest.split_whitespace().next().unwrap_or("").to_string();
                return RepoError::NotFound(format!("Product {} not found", product));
            }
            if let Some(rest) = msg.split(THROW_INSUFFICIENT_STOCK).nth(1) {
                let product = rest.split_whitespace().next().unwrap_or("").to_string();
                return RepoError::InsufficientStock(product);
            }
            if msg.contains("already contains") {
                return RepoError::Duplicate(msg.clone());
            }
        }
        RepoError::Database(messages.join("; "))
    }

    /// Fetch the fully materialized aggregate by id
    pub async fn get_detail(&self, id: &str) -> RepoResult<Option<OrderDetail>> {
        let order_id = make_record_id(ORDER_TABLE, id);

        let mut response = self
            .base
            .db()
            .query(
                "SELECT * FROM order WHERE id = $id;\n\
                 SELECT <string>product_id AS product_id, quantity \
                 FROM order_line WHERE order_id = $id;",
            )
            .bind(("id", order_id))
            .await?;

        let orders: Vec<Order> = response.take(0)?;
        let lines: Vec<OrderLineItem> = response.take(1)?;

        Ok(orders.into_iter().next().map(|order| to_detail(order, lines)))
    }

    /// List orders with optional filters, resolving each aggregate's lines
    pub async fn find_all(&self, filter: OrderFilter) -> RepoResult<Vec<OrderDetail>> {
        let mut where_parts: Vec<&str> = Vec::new();

        if filter.id.is_some() {
            where_parts.push("id = $order");
        }
        if filter.customer_id.is_some() {
            where_parts.push("customer_id = $customer");
        }
        if filter.status.is_some() {
            where_parts.push("string::lowercase(status) CONTAINS $status");
        }
        if filter.start_date.is_some() {
            where_parts.push("created_at >= $start_date");
        }
        if filter.end_date.is_some() {
            where_parts.push("created_at <= $end_date");
        }
        if filter.category.is_some() {
            // 通过关联表按商品分类过滤 (join)
            where_parts.push(
                "id IN (SELECT VALUE order_id FROM order_line \
                 WHERE string::lowercase(product_id.category) CONTAINS $category)",
            );
        }

        let mut query_str = String::from("SELECT * FROM order");
        if !where_parts.is_empty() {
            query_str.push_str(" WHERE ");
            query_str.push_str(&where_parts.join(" AND "));
        }

        let mut query = self.base.db().query(query_str);
        if let Some(id) = filter.id {
            query = query.bind(("order", make_record_id(ORDER_TABLE, &id)));
        }
        if let Some(customer) = filter.customer_id {
            query = query.bind(("customer", make_record_id(CUSTOMER_TABLE, &customer)));
        }
        if let Some(status) = filter.status {
            query = query.bind(("status", status.to_lowercase()));
        }
        if let Some(start) = filter.start_date {
            query = query.bind(("start_date", start.timestamp_millis()));
        }
        if let Some(end) = filter.end_date {
            query = query.bind(("end_date", end.timestamp_millis()));
        }
        if let Some(category) = filter.category {
            query = query.bind(("category", category.to_lowercase()));
        }

        let orders: Vec<Order> = query.await?.take(0)?;

        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            let lines = match &order.id {
                Some(id) => {
                    let mut response = self
                        .base
                        .db()
                        .query(
                            "SELECT <string>product_id AS product_id, quantity \
                             FROM order_line WHERE order_id = $id",
                        )
                        .bind(("id", id.clone()))
                        .await?;
                    response.take(0)?
                }
                None => Vec::new(),
            };
            details.push(to_detail(order, lines));
        }

        Ok(details)
    }

    /// Update an order's status — plain field replacement
    ///
    /// Any string is accepted; no transition table is enforced.
    pub async fn update(&self, id: &str, data: OrderUpdate) -> RepoResult<OrderDetail> {
        let order_id = make_record_id(ORDER_TABLE, id);

        if let Some(status) = data.status {
            let mut result = self
                .base
                .db()
                .query("UPDATE $thing SET status = $status RETURN AFTER")
                .bind(("thing", order_id.clone()))
                .bind(("status", status))
                .await?
                .check()?;
            let updated: Vec<serde_json::Value> = result.take(0)?;
            if updated.is_empty() {
                return Err(RepoError::NotFound(format!("Order {} not found", id)));
            }
        }

        self.get_detail(id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Order {} not found", id)))
    }

    /// Delete an order aggregate, restoring reserved stock
    ///
    /// Lines cascade with the header; each line's quantity is added back
    /// to its product inside the same transaction.
    pub async fn delete(&self, id: &str) -> RepoResult<()> {
        let order_id = make_record_id(ORDER_TABLE, id);

        // Existence check outside the transaction for a clean 404
        if self.get_detail(id).await?.is_none() {
            return Err(RepoError::NotFound(format!("Order {} not found", id)));
        }

        let mut response = self
            .base
            .db()
            .query(
                "BEGIN TRANSACTION;\n\
                 LET $lines = (SELECT * FROM order_line WHERE order_id = $id);\n\
                 FOR $line IN $lines { UPDATE $line.product_id SET stock_quantity += $line.quantity; };\n\
                 DELETE order_line WHERE order_id = $id;\n\
                 DELETE $id;\n\
                 COMMIT TRANSACTION;",
            )
            .bind(("id", order_id))
            .await?;

        let errors = response.take_errors();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.into_values().map(|e| e.to_string()).collect();
            return Err(RepoError::Database(messages.join("; ")));
        }

        Ok(())
    }
}

/// Storage engine commit conflicts are transient and worth retrying
fn is_commit_conflict(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    msg.contains("can be retried") || msg.contains("conflict")
}
