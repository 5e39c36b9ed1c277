//! Storefront Server - 小型订单管理后端
//!
//! # 架构概述
//!
//! - **认证** (`auth`): JWT + Argon2 认证体系，单角色 (admin/user) 授权
//! - **数据库** (`db`): 嵌入式 SurrealDB 存储，按表划分的仓储层
//! - **HTTP API** (`api`): RESTful API 接口 (客户、商品、订单)
//!
//! # 模块结构
//!
//! ```text
//! storefront-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── auth/          # JWT 认证、角色检查
//! ├── api/           # HTTP 路由和处理器
//! ├── db/            # 数据库层 (models + repository)
//! └── utils/         # 错误类型、日志
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::init_logger;

pub fn print_banner() {
    println!(
        r#"
   _____ __                  ____                 __
  / ___// /_____  ________  / __/________  ____  / /_
  \__ \/ __/ __ \/ ___/ _ \/ /_/ ___/ __ \/ __ \/ __/
 ___/ / /_/ /_/ / /  /  __/ __/ /  / /_/ / / / / /_
/____/\__/\____/_/   \___/_/ /_/   \____/_/ /_/\__/
    "#
    );
}
