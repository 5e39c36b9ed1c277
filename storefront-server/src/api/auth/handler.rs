//! Authentication Handlers
//!
//! Handles registration, login and token refresh

use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::{User, UserCreate};
use crate::db::repository::UserRepository;
use crate::utils::{AppError, AppResult};

/// Fixed delay for authentication to prevent timing attacks
const AUTH_FIXED_DELAY_MS: u64 = 100;

const VALID_ROLES: &[&str] = &["admin", "user"];

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

impl TokenResponse {
    fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub role: String,
}

/// POST /auth/register - 注册新用户
///
/// 公共路由。角色只接受 admin / user，重复用户名返回 409。
pub async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<UserCreate>,
) -> AppResult<(StatusCode, Json<UserInfo>)> {
    payload.validate()?;

    if !VALID_ROLES.contains(&payload.role.as_str()) {
        return Err(AppError::validation(format!(
            "role must be one of: {}",
            VALID_ROLES.join(", ")
        )));
    }

    let repo = UserRepository::new(state.get_db());
    let user = repo.create(payload).await?;

    tracing::info!(username = %user.username, role = %user.role, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(UserInfo {
            id: user.id.as_ref().map(|t| t.to_string()).unwrap_or_default(),
            username: user.username,
            role: user.role,
        }),
    ))
}

/// POST /auth/login - 用户登录
///
/// Authenticates credentials and returns a JWT access token
pub async fn login(
    State(state): State<ServerState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let repo = UserRepository::new(state.get_db());
    let user = repo.find_by_username(&req.username).await?;

    // Fixed delay to prevent timing attacks (before checking result)
    tokio::time::sleep(Duration::from_millis(AUTH_FIXED_DELAY_MS)).await;

    // 统一错误信息，避免用户名枚举
    let user = match user {
        Some(user) => {
            let password_valid = user.verify_password(&req.password).map_err(|e| {
                AppError::internal(format!("Password verification failed: {}", e))
            })?;

            if !password_valid {
                tracing::warn!(username = %req.username, "Login failed - invalid credentials");
                return Err(AppError::invalid_credentials());
            }

            user
        }
        None => {
            // 未命中用户也执行一次同等代价的 argon2 运算，
            // 时延上与密码错误不可区分
            let _ = User::hash_password(&req.password);
            tracing::warn!(username = %req.username, "Login failed - user not found");
            return Err(AppError::invalid_credentials());
        }
    };

    let user_id = user.id.as_ref().map(|t| t.to_string()).unwrap_or_default();

    let token = state
        .get_jwt_service()
        .generate_token(&user_id, &user.username, &user.role)
        .map_err(|e| AppError::internal(format!("Failed to generate token: {}", e)))?;

    tracing::info!(user_id = %user_id, username = %user.username, "User logged in");

    Ok(Json(TokenResponse::bearer(token)))
}

/// POST /auth/refresh-token - 刷新令牌
///
/// Re-issues a token with fresh expiry for the already-verified caller.
/// Credentials are not re-checked.
pub async fn refresh_token(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<TokenResponse>> {
    let token = state
        .get_jwt_service()
        .generate_token(&user.id, &user.username, &user.role)
        .map_err(|e| AppError::internal(format!("Failed to generate token: {}", e)))?;

    tracing::debug!(user_id = %user.id, "Token refreshed");

    Ok(Json(TokenResponse::bearer(token)))
}
