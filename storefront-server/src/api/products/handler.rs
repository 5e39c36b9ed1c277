//! Product API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use validator::Validate;

use crate::core::ServerState;
use crate::db::models::{Product, ProductCreate, ProductFilter, ProductUpdate};
use crate::db::repository::ProductRepository;
use crate::utils::{AppError, AppResult};

/// GET /products - 按条件获取商品列表
pub async fn list(
    State(state): State<ServerState>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<Product>>> {
    let repo = ProductRepository::new(state.get_db());
    let products = repo.find_all(filter).await?;
    Ok(Json(products))
}

/// GET /products/:id - 获取单个商品
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Product>> {
    let repo = ProductRepository::new(state.get_db());
    let product = repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product {}", id)))?;
    Ok(Json(product))
}

/// POST /products - 创建商品
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<ProductCreate>,
) -> AppResult<(StatusCode, Json<Product>)> {
    payload.validate()?;

    let repo = ProductRepository::new(state.get_db());
    let product = repo.create(payload).await?;

    tracing::info!(barcode = %product.barcode, "Product created");

    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /products/:id - 部分更新商品
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<ProductUpdate>,
) -> AppResult<Json<Product>> {
    let repo = ProductRepository::new(state.get_db());
    let product = repo.update(&id, payload).await?;
    Ok(Json(product))
}

/// DELETE /products/:id - 删除商品
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let repo = ProductRepository::new(state.get_db());
    repo.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
