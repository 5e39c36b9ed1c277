//! Product Repository (Inventory Ledger read side + CRUD)
//!
//! Stock decrements happen inside the order creation transaction
//! (see [`super::order::OrderRepository`]); everything here is plain CRUD.

use super::{BaseRepository, RepoError, RepoResult, make_record_id, strip_table_prefix};
use crate::db::models::{Product, ProductCreate, ProductFilter, ProductUpdate};
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const PRODUCT_TABLE: &str = "product";

#[derive(Clone)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// List products with optional category/price/availability filters
    ///
    /// Prices are stored as decimal strings, so comparisons cast both sides.
    pub async fn find_all(&self, filter: ProductFilter) -> RepoResult<Vec<Product>> {
        let mut where_parts: Vec<&str> = Vec::new();

        if filter.category.is_some() {
            where_parts.push("string::lowercase(category) CONTAINS $category");
        }
        if filter.min_price.is_some() {
            where_parts.push("type::decimal(unit_price) >= type::decimal($min_price)");
        }
        if filter.max_price.is_some() {
            where_parts.push("type::decimal(unit_price) <= type::decimal($max_price)");
        }
        if filter.available.is_some() {
            where_parts.push("available = $available");
        }

        let mut query_str = String::from("SELECT * FROM product");
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
        if let Some(category) = filter.category {
            query = query.bind(("category", category.to_lowercase()));
        }
        if let Some(min) = filter.min_price {
            query = query.bind(("min_price", min));
        }
        if let Some(max) = filter.max_price {
            query = query.bind(("max_price", max));
        }
        if let Some(available) = filter.available {
            query = query.bind(("available", available));
        }

        let products: Vec<Product> = query.await?.take(0)?;
        Ok(products)
    }

    /// Find product by id
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Product>> {
        let pure_id = strip_table_prefix(PRODUCT_TABLE, id);
        let product: Option<Product> = self.base.db().select((PRODUCT_TABLE, pure_id)).await?;
        Ok(product)
    }

    /// Create a new product
    ///
    /// The barcode must not collide with an existing product.
    pub async fn create(&self, data: ProductCreate) -> RepoResult<Product> {
        self.check_unique_barcode(&data.barcode, None).await?;

        let product = Product {
            id: None,
            description: data.description,
            unit_price: data.unit_price,
            barcode: data.barcode,
            category: data.category,
            stock_quantity: data.stock_quantity,
            expiry_date: data.expiry_date,
            image: data.image,
            available: data.available,
        };

        let created: Option<Product> = self
            .base
            .db()
            .create(PRODUCT_TABLE)
            .content(product)
            .await?;

        created.ok_or_else(|| RepoError::Database("Failed to create product".to_string()))
    }

    /// Update a product, applying only the provided fields
    pub async fn update(&self, id: &str, data: ProductUpdate) -> RepoResult<Product> {
        let pure_id = strip_table_prefix(PRODUCT_TABLE, id);
        let thing = make_record_id(PRODUCT_TABLE, pure_id);

        if let Some(ref barcode) = data.barcode {
            self.check_unique_barcode(barcode, Some(&thing)).await?;
        }
        if let Some(stock) = data.stock_quantity
            && stock < 0
        {
            return Err(RepoError::Validation(
                "stock_quantity must not be negative".into(),
            ));
        }

        // Build dynamic SET clauses with proper type bindings
        let mut set_parts: Vec<&str> = Vec::new();
        if data.description.is_some() {
            set_parts.push("description = $description");
        }
        if data.unit_price.is_some() {
            set_parts.push("unit_price = $unit_price");
        }
        if data.barcode.is_some() {
            set_parts.push("barcode = $barcode");
        }
        if data.category.is_some() {
            set_parts.push("category = $category");
        }
        if data.stock_quantity.is_some() {
            set_parts.push("stock_quantity = $stock_quantity");
        }
        if data.expiry_date.is_some() {
            set_parts.push("expiry_date = $expiry_date");
        }
        if data.image.is_some() {
            set_parts.push("image = $image");
        }
        if data.available.is_some() {
            set_parts.push("available = $available");
        }

        if set_parts.is_empty() {
            // No fields to update
            return self
                .find_by_id(pure_id)
                .await?
                .ok_or_else(|| RepoError::NotFound(format!("Product {} not found", id)));
        }

        let query_str = format!("UPDATE $thing SET {} RETURN AFTER", set_parts.join(", "));

        let mut query = self.base.db().query(query_str).bind(("thing", thing));
        if let Some(v) = data.description {
            query = query.bind(("description", v));
        }
        if let Some(v) = data.unit_price {
            query = query.bind(("unit_price", v));
        }
        if let Some(v) = data.barcode {
            query = query.bind(("barcode", v));
        }
        if let Some(v) = data.category {
            query = query.bind(("category", v));
        }
        if let Some(v) = data.stock_quantity {
            query = query.bind(("stock_quantity", v));
        }
        if let Some(v) = data.expiry_date {
            query = query.bind(("expiry_date", v));
        }
        if let Some(v) = data.image {
            query = query.bind(("image", v));
        }
        if let Some(v) = data.available {
            query = query.bind(("available", v));
        }

        let mut result = query.await?.check()?;
        let products: Vec<Product> = result.take(0)?;

        products
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound(format!("Product {} not found", id)))
    }

    /// Hard delete a product
    pub async fn delete(&self, id: &str) -> RepoResult<()> {
        let pure_id = strip_table_prefix(PRODUCT_TABLE, id);
        let deleted: Option<Product> = self.base.db().delete((PRODUCT_TABLE, pure_id)).await?;
        if deleted.is_none() {
            return Err(RepoError::NotFound(format!("Product {} not found", id)));
        }
        Ok(())
    }

    async fn check_unique_barcode(
        &self,
        barcode: &str,
        exclude: Option<&surrealdb::RecordId>,
    ) -> RepoResult<()> {
        let mut q = String::from("SELECT <string>id AS id FROM product WHERE barcode = $barcode");
        if exclude.is_some() {
            q.push_str(" AND id != $exclude");
        }
        let mut query = self
            .base
            .db()
            .query(q)
            .bind(("barcode", barcode.to_string()));
        if let Some(ex) = exclude {
            query = query.bind(("exclude", ex.clone()));
        }
        let mut result = query.await?;
        let found: Vec<serde_json::Value> = result.take(0)?;
        if !found.is_empty() {
            return Err(RepoError::Duplicate(format!(
                "barcode {} is already registered",
                barcode
            )));
        }
        Ok(())
    }
}
