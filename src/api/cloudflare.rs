//! Cloudflare Pages / KV / R2 endpoints / Cloudflare接口
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use cloudops_backend::correlate::Correlator;
use cloudops_backend::drivers::cloudflare::{CfResponse, KvKey, KvNamespace, KvValue, PagesProject};
use cloudops_backend::storage::{BulkReport, BulkTaskExecutor, ObjectStore, Paginator};
use cloudops_backend::utils::{is_within_prefix, normalize_dir_prefix};

use super::{ApiError, ApiResponse, ApiResult, RequestHeaders};
use crate::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct KvKeysRequest {
    #[serde(rename = "namespaceId")]
    pub namespace_id: String,
}

#[derive(Debug, Deserialize)]
pub struct KvValueRequest {
    #[serde(rename = "namespaceid")]
    pub namespace_id: String,
    #[serde(rename = "keyname")]
    pub key_name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateKvValueRequest {
    #[serde(rename = "namespaceid")]
    pub namespace_id: String,
    #[serde(rename = "keyname")]
    pub key_name: String,
    #[serde(rename = "keyvalue")]
    pub key_value: String,
}

#[derive(Debug, Deserialize)]
pub struct BucketRequest {
    #[serde(rename = "bucketname")]
    pub bucket_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteDirectoryRequest {
    #[serde(rename = "dirpath")]
    pub dir_path: String,
    #[serde(rename = "bucketname")]
    pub bucket_name: String,
}

#[derive(Debug, Deserialize)]
pub struct CopyDirectoryRequest {
    #[serde(rename = "sourcedir")]
    pub source_dir: String,
    #[serde(rename = "targetdir")]
    pub target_dir: String,
    #[serde(rename = "bucketname")]
    pub bucket_name: String,
}

fn require(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(&format!("{} 不能为空", field)));
    }
    Ok(())
}

/// A directory that normalizes to the bucket root is refused / 不允许操作整个存储桶
fn require_dir(value: &str, field: &str) -> Result<(), ApiError> {
    if normalize_dir_prefix(value).is_none() {
        return Err(ApiError::bad_request(&format!("{} 不能为空或根目录", field)));
    }
    Ok(())
}

/// Copying into the source itself or below it is refused / 不允许复制到源目录内部
fn require_disjoint(source_dir: &str, target_dir: &str) -> Result<(), ApiError> {
    if let (Some(source), Some(target)) = (normalize_dir_prefix(source_dir), normalize_dir_prefix(target_dir)) {
        if is_within_prefix(&target, &source) {
            return Err(ApiError::bad_request("targetdir 不能是 sourcedir 本身或其子目录"));
        }
    }
    Ok(())
}

/// Object store behind the shared R2 client / 当前R2客户端
fn object_store(state: &AppState) -> Result<Arc<dyn ObjectStore>, ApiError> {
    let store: Arc<dyn ObjectStore> = state.r2.get()?;
    Ok(store)
}

/// GET /api/v1/cloudflare/pages/info
pub async fn pages_info(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    headers: RequestHeaders,
) -> ApiResult<CfResponse<PagesProject>> {
    tracing::info!("Getting correlated Pages info, env: {}, country: {}", headers.env, headers.country_code);
    let correlator = Correlator::new(&state.cloudflare, state.config.cloudflare.correlation_marker.clone());
    let projects = correlator.fetch_correlated().await?;
    tracing::info!("Found {} Pages projects with a production KV binding", projects.len());
    Ok(Json(ApiResponse::success(CfResponse::ok(projects))))
}

/// GET /api/v1/cloudflare/pages/projects
pub async fn pages_projects(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    _headers: RequestHeaders,
) -> ApiResult<CfResponse<PagesProject>> {
    let projects = state.cloudflare.pages_projects().await?;
    Ok(Json(ApiResponse::success(CfResponse::ok(projects))))
}

/// GET /api/v1/cloudflare/kv/namespaces
pub async fn kv_namespaces(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    _headers: RequestHeaders,
) -> ApiResult<CfResponse<KvNamespace>> {
    let namespaces = state.cloudflare.kv_namespaces().await?;
    Ok(Json(ApiResponse::success(CfResponse::ok(namespaces))))
}

/// POST /api/v1/cloudflare/kv/namespaces/keys
pub async fn kv_keys(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    _headers: RequestHeaders,
    Json(req): Json<KvKeysRequest>,
) -> ApiResult<CfResponse<KvKey>> {
    require(&req.namespace_id, "namespaceId")?;
    let keys = state.cloudflare.kv_keys(&req.namespace_id).await?;
    Ok(Json(ApiResponse::success(CfResponse::ok(keys))))
}

/// POST /api/v1/cloudflare/kv/namespaces/keys/values
pub async fn kv_value(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    _headers: RequestHeaders,
    Json(req): Json<KvValueRequest>,
) -> ApiResult<KvValue> {
    require(&req.namespace_id, "namespaceid")?;
    require(&req.key_name, "keyname")?;
    let value = state.cloudflare.kv_value(&req.namespace_id, &req.key_name).await?;
    Ok(Json(ApiResponse::success(value)))
}

/// PUT /api/v1/cloudflare/kv/namespaces/keys/values
pub async fn update_kv_value(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    headers: RequestHeaders,
    Json(req): Json<UpdateKvValueRequest>,
) -> ApiResult<CfResponse<Value>> {
    require(&req.namespace_id, "namespaceid")?;
    require(&req.key_name, "keyname")?;
    tracing::info!(
        "Updating KV {}/{} (env: {}, country: {})",
        req.namespace_id,
        req.key_name,
        headers.env,
        headers.country_code
    );
    let envelope = state
        .cloudflare
        .put_kv_value(&req.namespace_id, &req.key_name, req.key_value)
        .await?;
    Ok(Json(ApiResponse::success(envelope)))
}

/// POST /api/v1/cloudflare/bucketinfo
///
/// Top-level directories (trailing separator removed) and root objects.
pub async fn bucket_info(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    headers: RequestHeaders,
    Json(req): Json<BucketRequest>,
) -> ApiResult<CfResponse<KvKey>> {
    require(&req.bucket_name, "bucketname")?;
    tracing::info!(
        "BucketName: {}, Country-Code: {}, Env: {}",
        req.bucket_name,
        headers.country_code,
        headers.env
    );

    let paginator = Paginator::new(object_store(&state)?);
    let names = paginator.list_direct_children(&req.bucket_name, "").await?;

    let entries = names.into_iter().map(KvKey::new).collect();
    Ok(Json(ApiResponse::success(CfResponse::ok(entries))))
}

/// DELETE /api/v1/cloudflare/bucketinfo
pub async fn delete_directory(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    _headers: RequestHeaders,
    Json(req): Json<DeleteDirectoryRequest>,
) -> ApiResult<BulkReport> {
    require(&req.bucket_name, "bucketname")?;
    require_dir(&req.dir_path, "dirpath")?;
    tracing::info!("Deleting directory {} in bucket {}", req.dir_path, req.bucket_name);

    let executor = BulkTaskExecutor::new(object_store(&state)?, &state.config.bulk);
    let report = executor.delete_directory(&req.bucket_name, &req.dir_path).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// POST /api/v1/cloudflare/bucketinfo/copy
pub async fn copy_directory(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    _headers: RequestHeaders,
    Json(req): Json<CopyDirectoryRequest>,
) -> ApiResult<BulkReport> {
    require(&req.bucket_name, "bucketname")?;
    require_dir(&req.source_dir, "sourcedir")?;
    require_dir(&req.target_dir, "targetdir")?;
    require_disjoint(&req.source_dir, &req.target_dir)?;
    tracing::info!(
        "Copying directory in bucket {} from {} to {}",
        req.bucket_name,
        req.source_dir,
        req.target_dir
    );

    let executor = BulkTaskExecutor::new(object_store(&state)?, &state.config.bulk);
    let report = executor
        .copy_directory(&req.bucket_name, &req.source_dir, &req.target_dir)
        .await?;
    Ok(Json(ApiResponse::success(report)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_field_names() {
        let copy: CopyDirectoryRequest =
            serde_json::from_str(r#"{"sourcedir": "v1", "targetdir": "v2", "bucketname": "assets"}"#).unwrap();
        assert_eq!(copy.source_dir, "v1");
        assert_eq!(copy.target_dir, "v2");

        let keys: KvKeysRequest = serde_json::from_str(r#"{"namespaceId": "ns-1"}"#).unwrap();
        assert_eq!(keys.namespace_id, "ns-1");

        let put: UpdateKvValueRequest =
            serde_json::from_str(r#"{"namespaceid": "ns-1", "keyname": "ProdVersion", "keyvalue": "42"}"#).unwrap();
        assert_eq!(put.key_value, "42");
    }

    #[test]
    fn test_require_rejects_blank() {
        assert!(require("assets", "bucketname").is_ok());
        let err = require("  ", "bucketname").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert!(require_dir("v1/", "sourcedir").is_ok());
        assert!(require_dir("//", "sourcedir").is_err());
    }

    #[test]
    fn test_copy_target_inside_source_is_rejected() {
        assert!(require_disjoint("v1", "v2").is_ok());
        assert!(require_disjoint("v1", "v10").is_ok());
        let err = require_disjoint("v1/", "v1").unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        assert!(require_disjoint("v1", "v1/backup").is_err());
    }
}
