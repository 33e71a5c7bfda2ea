//! Function Compute endpoints / 函数计算接口
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use cloudops_backend::drivers::aliyun_fc::{AliasInfo, FcClient, FunctionInfo, ServiceInfo, ServiceVersion};

use super::{ApiError, ApiResponse, ApiResult, RequestHeaders};
use crate::auth::AuthUser;
use crate::db;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ServiceRequest {
    #[serde(rename = "ServiceName")]
    pub service_name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAliasRequest {
    #[serde(rename = "versionid")]
    pub version_id: String,
    #[serde(rename = "servicename")]
    pub service_name: String,
    #[serde(rename = "aliasname")]
    pub alias_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub description: String,
    #[serde(rename = "servicename")]
    pub service_name: String,
}

fn fc_client(state: &AppState) -> Result<Arc<FcClient>, ApiError> {
    Ok(state.fc.get()?)
}

fn require_service(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("ServiceName 不能为空"));
    }
    Ok(())
}

/// GET /api/v1/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    headers: RequestHeaders,
) -> ApiResult<Vec<ServiceInfo>> {
    tracing::info!("env: {}, countryCode: {}", headers.env, headers.country_code);
    let services = fc_client(&state)?.list_services().await?;
    Ok(Json(ApiResponse::success(services)))
}

/// POST /api/v1/services/versions
pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    _headers: RequestHeaders,
    Json(req): Json<ServiceRequest>,
) -> ApiResult<Vec<ServiceVersion>> {
    require_service(&req.service_name)?;
    let versions = fc_client(&state)?.list_service_versions(&req.service_name).await?;
    Ok(Json(ApiResponse::success(versions)))
}

/// POST /api/v1/services/functions
pub async fn list_functions(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    _headers: RequestHeaders,
    Json(req): Json<ServiceRequest>,
) -> ApiResult<Vec<FunctionInfo>> {
    require_service(&req.service_name)?;
    let functions = fc_client(&state)?.list_functions(&req.service_name).await?;
    Ok(Json(ApiResponse::success(functions)))
}

/// POST /api/v1/services/aliases
pub async fn list_aliases(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    _headers: RequestHeaders,
    Json(req): Json<ServiceRequest>,
) -> ApiResult<Vec<AliasInfo>> {
    require_service(&req.service_name)?;
    let aliases = fc_client(&state)?.list_aliases(&req.service_name).await?;
    Ok(Json(ApiResponse::success(aliases)))
}

/// PUT /api/v1/services/aliases
///
/// The switch is recorded in `alias_records` after FC accepted it.
pub async fn update_alias(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: RequestHeaders,
    Json(req): Json<UpdateAliasRequest>,
) -> ApiResult<AliasInfo> {
    require_service(&req.service_name)?;
    if req.alias_name.trim().is_empty() || req.version_id.trim().is_empty() {
        return Err(ApiError::bad_request("aliasname 和 versionid 不能为空"));
    }
    tracing::info!(
        "User {} switching alias {}/{} to version {} (env: {}, country: {})",
        user.username,
        req.service_name,
        req.alias_name,
        req.version_id,
        headers.env,
        headers.country_code
    );

    let alias = fc_client(&state)?
        .update_alias(&req.service_name, &req.alias_name, &req.version_id)
        .await?;

    if let Err(e) = db::insert_alias_record(
        &state.db,
        &req.service_name,
        &req.alias_name,
        &req.version_id,
        req.description.as_deref(),
    )
    .await
    {
        tracing::warn!("Failed to record alias switch: {}", e);
    }

    Ok(Json(ApiResponse::success(alias)))
}

/// POST /api/v1/services/publish
pub async fn publish_version(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    _headers: RequestHeaders,
    Json(req): Json<PublishRequest>,
) -> ApiResult<ServiceVersion> {
    require_service(&req.service_name)?;
    tracing::info!("User {} publishing a version of {}", user.username, req.service_name);
    let version = fc_client(&state)?
        .publish_service_version(&req.service_name, &req.description)
        .await?;
    Ok(Json(ApiResponse::success(version)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_field_names() {
        let service: ServiceRequest = serde_json::from_str(r#"{"ServiceName": "demo"}"#).unwrap();
        assert_eq!(service.service_name, "demo");

        let alias: UpdateAliasRequest =
            serde_json::from_str(r#"{"versionid": "3", "servicename": "demo", "aliasname": "prod"}"#).unwrap();
        assert_eq!(alias.version_id, "3");
        assert!(alias.description.is_none());

        let publish: PublishRequest = serde_json::from_str(r#"{"servicename": "demo"}"#).unwrap();
        assert_eq!(publish.description, "");
    }
}
