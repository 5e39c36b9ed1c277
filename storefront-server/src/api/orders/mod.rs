//! Order API 模块
//!
//! 下单、改状态、删除均为 admin 操作；查询只需令牌。

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::auth::middleware::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/orders", read_routes().merge(manage_routes()))
}

fn read_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/{id}", get(handler::get_by_id))
}

fn manage_routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{id}", put(handler::update).delete(handler::delete))
        .route_layer(middleware::from_fn(require_admin))
}
