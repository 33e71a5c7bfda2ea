use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::SqlitePool;

use crate::api::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "session_token";

const TOKEN_LENGTH: usize = 64;

/// Authenticated caller / 已登录用户
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
    pub token: String,
}

/// Random alphanumeric session token / 生成随机会话token
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Token from `Authorization: Bearer` or the session cookie / 从请求头或Cookie中提取token
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get(header::COOKIE)
        .and_then(|cookie_header| cookie_header.to_str().ok())
        .and_then(|cookie_str| {
            for cookie in cookie_str.split(';') {
                if let Some((key, value)) = cookie.trim().split_once('=') {
                    if key.trim() == SESSION_COOKIE_NAME && !value.trim().is_empty() {
                        return Some(value.trim().to_string());
                    }
                }
            }
            None
        })
}

/// Store a new session for the user / 创建会话
pub async fn create_session(pool: &SqlitePool, user_id: &str, username: &str, ttl_hours: i64) -> anyhow::Result<String> {
    let token = generate_token();
    let now = Utc::now();
    let expires_at = (now + Duration::hours(ttl_hours)).timestamp();

    sqlx::query("INSERT INTO user_sessions (token, user_id, username, expires_at, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&token)
        .bind(user_id)
        .bind(username)
        .bind(expires_at)
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;

    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(now.to_rfc3339())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(token)
}

/// Resolve a live session of an enabled user / 验证会话
pub async fn verify_session(pool: &SqlitePool, token: &str) -> Result<AuthUser, String> {
    let row: Option<(String, String)> = sqlx::query_as(
        "SELECT s.user_id, s.username FROM user_sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = ? AND s.expires_at > ? AND u.enabled = 1",
    )
    .bind(token)
    .bind(Utc::now().timestamp())
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("Session lookup failed: {}", e);
        "验证session失败".to_string()
    })?;

    match row {
        Some((user_id, username)) => Ok(AuthUser {
            user_id,
            username,
            token: token.to_string(),
        }),
        None => Err("无效的session或已过期".to_string()),
    }
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Revoke every session of a user / 删除用户的全部会话
pub async fn revoke_user_sessions(pool: &SqlitePool, user_id: &str) -> anyhow::Result<u64> {
    let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(&parts.headers).ok_or_else(|| ApiError::unauthorized("未登录"))?;
        verify_session(&state.db, &token).await.map_err(|msg| {
            tracing::debug!("Session rejected: {}", msg);
            ApiError::unauthorized(&msg)
        })
    }
}
