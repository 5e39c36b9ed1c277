//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查接口
//! - [`auth`] - 认证相关接口 (注册 / 登录 / 刷新令牌)
//! - [`customers`] - 客户管理接口 (`/clients`)
//! - [`products`] - 商品管理接口
//! - [`orders`] - 订单管理接口
//!
//! 读操作要求有效令牌，写操作额外要求 admin 角色。
//! 公共路由 (注册/登录/健康检查) 在 [`crate::auth::middleware::require_auth`]
//! 中放行。

pub mod auth;
pub mod customers;
pub mod health;
pub mod orders;
pub mod products;

use axum::{Router, middleware};
use tower::Layer;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

use crate::auth::middleware::require_auth;
use crate::core::ServerState;

/// Merge every resource router into one routing table
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(customers::router())
        .merge(products::router())
        .merge(orders::router())
}

/// Full application: routes + auth, trace and CORS layers
///
/// 尾斜杠归一化必须包在 Router 外层才能先于路由匹配执行，
/// `/clients` 与 `/clients/` 因此命中同一路由。
pub fn build_app(state: &ServerState) -> NormalizePath<Router> {
    let router = build_router()
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    NormalizePathLayer::trim_trailing_slash().layer(router)
}
