//! Order API Handlers
//!
//! 下单走仓储层的单事务流程：库存校验、扣减、落单要么全部生效，
//! 要么全部回滚。

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::core::ServerState;
use crate::db::models::{OrderCreate, OrderDetail, OrderFilter, OrderUpdate};
use crate::db::repository::OrderRepository;
use crate::utils::{AppError, AppResult};

/// GET /orders - 按条件获取订单列表
///
/// 支持订单 id、客户 id、状态、商品分类与下单日期区间的组合过滤。
pub async fn list(
    State(state): State<ServerState>,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<Vec<OrderDetail>>> {
    let repo = OrderRepository::new(state.get_db());
    let orders = repo.find_all(filter).await?;
    Ok(Json(orders))
}

/// GET /orders/:id - 获取订单聚合 (含行项)
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<OrderDetail>> {
    let repo = OrderRepository::new(state.get_db());
    let order = repo
        .get_detail(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {}", id)))?;
    Ok(Json(order))
}

/// POST /orders - 创建订单 (原子库存预留)
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<OrderCreate>,
) -> AppResult<(StatusCode, Json<OrderDetail>)> {
    let repo = OrderRepository::new(state.get_db());
    let order = repo.create(payload).await?;

    tracing::info!(
        order_id = %order.id,
        customer_id = %order.customer_id,
        lines = order.lines.len(),
        "Order created"
    );

    Ok((StatusCode::CREATED, Json(order)))
}

/// PUT /orders/:id - 更新订单状态
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<OrderUpdate>,
) -> AppResult<Json<OrderDetail>> {
    let repo = OrderRepository::new(state.get_db());
    let order = repo.update(&id, payload).await?;
    Ok(Json(order))
}

/// DELETE /orders/:id - 删除订单
///
/// 行项级联删除，预留库存在同一事务内归还。
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let repo = OrderRepository::new(state.get_db());
    repo.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
