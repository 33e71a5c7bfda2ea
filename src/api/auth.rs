use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use cloudops_backend::models::User;

use super::{ApiError, ApiResponse, ApiResult};
use crate::auth::{self, AuthUser, SESSION_COOKIE_NAME};
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub expires_in_hours: i64,
}

fn session_cookie(value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ? AND enabled = 1")
        .bind(&req.username)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::unauthorized("账号或密码错误"))?;

    let valid = bcrypt::verify(&req.password, &user.password_hash).map_err(|e| anyhow::anyhow!(e))?;
    if !valid {
        tracing::warn!("Failed login for user {}", req.username);
        return Err(ApiError::unauthorized("账号或密码错误"));
    }

    let ttl = state.config.auth.session_ttl_hours;
    let token = auth::create_session(&state.db, &user.id, &user.username, ttl).await?;
    cookies.add(session_cookie(token.clone()));

    tracing::info!("User {} logged in", user.username);
    Ok(Json(ApiResponse::success(LoginResponse {
        token,
        username: user.username,
        expires_in_hours: ttl,
    })))
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<User> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("用户名不能为空"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("密码长度至少6位"));
    }

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::bad_request("用户名已存在"));
    }

    let hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST).map_err(|e| anyhow::anyhow!(e))?;
    let now = Utc::now().to_rfc3339();
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO users (id, username, password_hash, is_admin, enabled, created_at, updated_at)
         VALUES (?, ?, ?, 0, 1, ?, ?)",
    )
    .bind(&id)
    .bind(username)
    .bind(&hash)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!("Registered user {}", user.username);
    Ok(Json(ApiResponse::success(user)))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    cookies: Cookies,
) -> ApiResult<()> {
    auth::delete_session(&state.db, &user.token).await?;
    cookies.remove(session_cookie(String::new()));
    tracing::info!("User {} logged out", user.username);
    Ok(Json(ApiResponse::message("已退出登录")))
}

/// POST /api/v1/auth/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    cookies: Cookies,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<()> {
    let (password_hash,): (String,) = sqlx::query_as("SELECT password_hash FROM users WHERE id = ?")
        .bind(&user.user_id)
        .fetch_one(&state.db)
        .await?;

    let valid = bcrypt::verify(&req.current_password, &password_hash).map_err(|e| anyhow::anyhow!(e))?;
    if !valid {
        return Err(ApiError::bad_request("当前密码错误"));
    }
    if req.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("新密码长度至少6位"));
    }

    let new_hash = bcrypt::hash(&req.new_password, bcrypt::DEFAULT_COST).map_err(|e| anyhow::anyhow!(e))?;
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&new_hash)
        .bind(Utc::now().to_rfc3339())
        .bind(&user.user_id)
        .execute(&state.db)
        .await?;

    // 删除该用户所有session，强制重新登录
    let revoked = auth::revoke_user_sessions(&state.db, &user.user_id).await?;
    cookies.remove(session_cookie(String::new()));

    tracing::info!("User {} changed password, revoked {} session(s)", user.username, revoked);
    Ok(Json(ApiResponse::message("密码修改成功")))
}
