//! Customer API 模块
//!
//! 对外路径沿用 `/clients`。读操作需要令牌，写操作需要 admin。

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::middleware::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/clients", read_routes().merge(manage_routes()))
}

fn read_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/{id}", get(handler::get_by_id))
}

fn manage_routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route(
            "/{id}",
            axum::routing::put(handler::update).delete(handler::delete),
        )
        .route_layer(middleware::from_fn(require_admin))
}
