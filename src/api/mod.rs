pub mod accounts;
pub mod auth;
pub mod cloudflare;
pub mod fc;
pub mod system;

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use cloudops_backend::error::GatewayError;

use crate::state::AppState;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    /// Success without payload / 无数据的成功响应
    pub fn message(message: &str) -> Self {
        Self {
            code: 200,
            message: message.to_string(),
            data: None,
        }
    }
}

/// Handler error rendered as `ApiResponse` with a matching status / 接口错误
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal(message: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

/// HTTP status for a gateway error / 网关错误对应的HTTP状态码
pub fn gateway_status(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::ReentrantCacheAccess { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        e if e.is_config_error() => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status = gateway_status(&err);
        tracing::error!("Request failed ({}): {}", status, err);
        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", err);
        Self::internal("服务器错误")
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        Self::internal("数据库错误")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()>::error(self.status.as_u16() as i32, &self.message);
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Required `Env` and `Country-Code` headers / 必需的请求头
#[derive(Debug, Clone)]
pub struct RequestHeaders {
    pub env: String,
    pub country_code: String,
}

impl RequestHeaders {
    fn required(parts: &Parts, name: &str) -> Result<String, ApiError> {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::bad_request(&format!("缺少请求头: {}", name)))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequestHeaders {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        Ok(Self {
            env: Self::required(parts, "Env")?,
            country_code: Self::required(parts, "Country-Code")?,
        })
    }
}
