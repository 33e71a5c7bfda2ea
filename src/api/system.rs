use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use cloudops_backend::cache::ProviderKind;

use super::{ApiResponse, ApiResult};
use crate::auth::AuthUser;
use crate::state::AppState;

/// GET /healthcheck - 健康检查
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "cloudops 服务运行正常",
        "version": env!("CARGO_PKG_VERSION"),
        "build_time": env!("BUILD_TIME"),
    }))
}

#[derive(Debug, Serialize)]
pub struct ZoneInfo {
    pub userid: String,
    pub username: String,
    pub environment: String,
    pub country_code: Vec<String>,
}

/// GET /api/v1/system/zones
///
/// Confirms the session token and reports the caller with the configured zones.
pub async fn zone_info(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<ZoneInfo> {
    let zones = &state.config.zones;
    Ok(Json(ApiResponse::success(ZoneInfo {
        userid: user.user_id,
        username: user.username,
        environment: zones.environment.clone(),
        country_code: zones.country_codes.clone(),
    })))
}

#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub provider: ProviderKind,
    pub loaded: bool,
    pub generation: u64,
}

/// POST /api/v1/system/config/refresh
///
/// Reloads every provider; a provider that fails keeps its previous config.
pub async fn refresh_config(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Vec<ProviderStatus>> {
    tracing::info!("User {} requested a config refresh", user.username);
    let outcome = state.cache.refresh_all().await;

    let statuses: Vec<ProviderStatus> = ProviderKind::ALL
        .into_iter()
        .map(|kind| ProviderStatus {
            provider: kind,
            loaded: state.cache.get(kind).is_ok(),
            generation: state.cache.generation(kind),
        })
        .collect();

    let mut response = ApiResponse::success(statuses);
    if let Err(e) = outcome {
        response.message = format!("部分配置刷新失败: {}", e);
    }
    Ok(Json(response))
}
