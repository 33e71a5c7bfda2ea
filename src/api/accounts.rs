//! Provider account management / 云账号管理
//!
//! Every successful mutation reloads the matching provider config so that the
//! shared clients pick up the new credentials on their next use.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use cloudops_backend::accounts;
use cloudops_backend::cache::{ConfigCache, ProviderKind};
use cloudops_backend::models::{
    AliyunAccount, AliyunAccountPayload, AliyunAccountUpdate, CloudflareAccount,
    CloudflareAccountPayload, CloudflareAccountUpdate,
};

use super::{ApiError, ApiResponse, ApiResult};
use crate::auth::AuthUser;
use crate::state::AppState;

/// Reload a provider config; when no active account is left, drop it
/// 重新加载配置，没有激活账号时使配置失效
pub async fn sync_provider(cache: &ConfigCache, kind: ProviderKind) {
    if let Err(e) = cache.refresh(kind).await {
        tracing::warn!("Reloading {} config failed, invalidating: {}", kind, e);
        if let Err(e) = cache.invalidate(kind) {
            tracing::error!("Failed to invalidate {} config: {}", kind, e);
        }
    }
}

fn not_found(id: i64) -> ApiError {
    ApiError::new(axum::http::StatusCode::NOT_FOUND, format!("账号不存在: {}", id))
}

pub async fn list_cloudflare_accounts(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Vec<CloudflareAccount>> {
    let rows = accounts::list_cloudflare_accounts(&state.db).await?;
    Ok(Json(ApiResponse::success(rows)))
}

pub async fn create_cloudflare_account(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(req): Json<CloudflareAccountPayload>,
) -> ApiResult<i64> {
    if req.account_id.trim().is_empty() {
        return Err(ApiError::bad_request("account_id 不能为空"));
    }
    let id = accounts::create_cloudflare_account(&state.db, &req).await?;
    tracing::info!("Created cloudflare account {} ({})", id, req.account_id);
    sync_provider(&state.cache, ProviderKind::Cloudflare).await;
    Ok(Json(ApiResponse::success(id)))
}

pub async fn update_cloudflare_account(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<CloudflareAccountUpdate>,
) -> ApiResult<()> {
    if !accounts::update_cloudflare_account(&state.db, id, &req).await? {
        return Err(not_found(id));
    }
    tracing::info!("Updated cloudflare account {}", id);
    sync_provider(&state.cache, ProviderKind::Cloudflare).await;
    Ok(Json(ApiResponse::message("更新成功")))
}

pub async fn delete_cloudflare_account(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    if !accounts::delete_cloudflare_account(&state.db, id).await? {
        return Err(not_found(id));
    }
    tracing::info!("Deleted cloudflare account {}", id);
    sync_provider(&state.cache, ProviderKind::Cloudflare).await;
    Ok(Json(ApiResponse::message("删除成功")))
}

pub async fn list_aliyun_accounts(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> ApiResult<Vec<AliyunAccount>> {
    let rows = accounts::list_aliyun_accounts(&state.db).await?;
    Ok(Json(ApiResponse::success(rows)))
}

pub async fn create_aliyun_account(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(req): Json<AliyunAccountPayload>,
) -> ApiResult<i64> {
    if req.account_id.trim().is_empty() || req.region.trim().is_empty() {
        return Err(ApiError::bad_request("account_id 和 region 不能为空"));
    }
    let id = accounts::create_aliyun_account(&state.db, &req).await?;
    tracing::info!("Created aliyun account {} ({})", id, req.account_id);
    sync_provider(&state.cache, ProviderKind::Aliyun).await;
    Ok(Json(ApiResponse::success(id)))
}

pub async fn update_aliyun_account(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<AliyunAccountUpdate>,
) -> ApiResult<()> {
    if !accounts::update_aliyun_account(&state.db, id, &req).await? {
        return Err(not_found(id));
    }
    tracing::info!("Updated aliyun account {}", id);
    sync_provider(&state.cache, ProviderKind::Aliyun).await;
    Ok(Json(ApiResponse::message("更新成功")))
}

pub async fn delete_aliyun_account(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    if !accounts::delete_aliyun_account(&state.db, id).await? {
        return Err(not_found(id));
    }
    tracing::info!("Deleted aliyun account {}", id);
    sync_provider(&state.cache, ProviderKind::Aliyun).await;
    Ok(Json(ApiResponse::message("删除成功")))
}
