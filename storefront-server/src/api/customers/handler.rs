//! Customer API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use validator::Validate;

use crate::core::ServerState;
use crate::db::models::{Customer, CustomerCreate, CustomerFilter, CustomerUpdate};
use crate::db::repository::CustomerRepository;
use crate::utils::{AppError, AppResult};

/// GET /clients - 按条件获取客户列表
pub async fn list(
    State(state): State<ServerState>,
    Query(filter): Query<CustomerFilter>,
) -> AppResult<Json<Vec<Customer>>> {
    let repo = CustomerRepository::new(state.get_db());
    let customers = repo.find_all(filter).await?;
    Ok(Json(customers))
}

/// GET /clients/:id - 获取单个客户
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Customer>> {
    let repo = CustomerRepository::new(state.get_db());
    let customer = repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Customer {}", id)))?;
    Ok(Json(customer))
}

/// POST /clients - 创建客户
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CustomerCreate>,
) -> AppResult<(StatusCode, Json<Customer>)> {
    payload.validate()?;

    let repo = CustomerRepository::new(state.get_db());
    let customer = repo.create(payload).await?;

    tracing::info!(email = %customer.email, "Customer created");

    Ok((StatusCode::CREATED, Json(customer)))
}

/// PUT /clients/:id - 部分更新客户
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<CustomerUpdate>,
) -> AppResult<Json<Customer>> {
    payload.validate()?;

    let repo = CustomerRepository::new(state.get_db());
    let customer = repo.update(&id, payload).await?;
    Ok(Json(customer))
}

/// DELETE /clients/:id - 删除客户
///
/// 客户名下仍有订单时拒绝删除 (409)。
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let repo = CustomerRepository::new(state.get_db());
    repo.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
