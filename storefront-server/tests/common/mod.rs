//! 集成测试基础设施
//!
//! 每个测试独享一个 tempdir 里的嵌入式数据库，路由层直接用
//! `tower::ServiceExt::oneshot` 驱动，无需监听端口。

// 每个测试二进制只用到部分辅助函数
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use tower_http::normalize_path::NormalizePath;

use storefront_server::auth::{JwtConfig, JwtService};
use storefront_server::core::{Config, ServerState};
use storefront_server::db::DbService;

pub struct TestApp {
    pub app: NormalizePath<Router>,
    pub state: ServerState,
    // 保持 tempdir 存活到测试结束
    _work_dir: TempDir,
}

fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "integration-test-secret-0123456789abcdef".to_string(),
        expiration_minutes: 30,
        issuer: "storefront-server".to_string(),
        audience: "storefront-clients".to_string(),
    }
}

pub async fn spawn_app() -> TestApp {
    let work_dir = tempfile::tempdir().expect("create tempdir");
    let db_path = work_dir.path().join("storefront.db");

    let db_service = DbService::new(&db_path.to_string_lossy())
        .await
        .expect("open embedded database");

    let mut config = Config::with_overrides(work_dir.path().to_string_lossy(), 0);
    config.jwt = test_jwt_config();

    let state = ServerState::new(
        config,
        db_service.db,
        Arc::new(JwtService::with_config(test_jwt_config())),
    );

    let app = storefront_server::api::build_app(&state);

    TestApp {
        app,
        state,
        _work_dir: work_dir,
    }
}

impl TestApp {
    /// 发送一次请求，返回 (状态码, 响应体 JSON)
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("route request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse response JSON")
        };

        (status, value)
    }

    /// 注册用户，返回响应体
    pub async fn register(&self, username: &str, password: &str, role: &str) -> (StatusCode, Value) {
        self.request(
            "POST",
            "/auth/register",
            None,
            Some(json!({"username": username, "password": password, "role": role})),
        )
        .await
    }

    /// 登录，返回 access token
    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/auth/login",
                None,
                Some(json!({"username": username, "password": password})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["access_token"]
            .as_str()
            .expect("access_token in login response")
            .to_string()
    }

    /// 注册并登录一个 admin，返回 token
    pub async fn admin_token(&self) -> String {
        let (status, _) = self.register("boss", "secret-password", "admin").await;
        assert_eq!(status, StatusCode::CREATED);
        self.login("boss", "secret-password").await
    }

    /// 注册并登录一个普通用户，返回 token
    pub async fn user_token(&self) -> String {
        let (status, _) = self.register("clerk", "secret-password", "user").await;
        assert_eq!(status, StatusCode::CREATED);
        self.login("clerk", "secret-password").await
    }

    /// 创建客户，返回其 id
    pub async fn create_customer(&self, token: &str, name: &str, email: &str, nid: &str) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/clients/",
                Some(token),
                Some(json!({"name": name, "email": email, "national_id": nid})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create customer: {body}");
        body["id"].as_str().expect("customer id").to_string()
    }

    /// 创建商品，返回其 id
    pub async fn create_product(
        &self,
        token: &str,
        description: &str,
        barcode: &str,
        category: &str,
        price: &str,
        stock: i64,
    ) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/products/",
                Some(token),
                Some(json!({
                    "description": description,
                    "unit_price": price,
                    "barcode": barcode,
                    "category": category,
                    "stock_quantity": stock,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create product: {body}");
        body["id"].as_str().expect("product id").to_string()
    }

    /// 读取商品当前库存
    pub async fn stock_of(&self, token: &str, product_id: &str) -> i64 {
        let (status, body) = self
            .request("GET", &format!("/products/{product_id}"), Some(token), None)
            .await;
        assert_eq!(status, StatusCode::OK, "get product: {body}");
        body["stock_quantity"].as_i64().expect("stock_quantity")
    }
}
