//! Gateway error kinds / 网关错误类型

use std::fmt;

use thiserror::Error;

use crate::cache::ProviderKind;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// A single failed copy/delete applied by a bulk worker / 单个失败的批量任务
#[derive(Debug, Clone)]
pub struct TaskFailure {
    /// Object key the task was applied to / 任务对应的对象键
    pub key: String,
    pub message: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Cache holds no value for the provider / 缓存中没有该提供方配置
    #[error("{0} config not loaded")]
    ConfigNotLoaded(ProviderKind),

    /// Backing store could not produce a provider config / 无法从存储加载配置
    #[error("failed to load {kind} config: {message}")]
    SourceUnavailable { kind: ProviderKind, message: String },

    /// Cache entered again from one of its own callbacks / 回调中重入配置缓存
    #[error("config cache re-entered from an invalidation callback ({operation})")]
    ReentrantCacheAccess { operation: &'static str },

    #[error("failed to list objects under '{prefix}': {message}")]
    ListingFailed { prefix: String, message: String },

    #[error("{operation} failed for '{key}': {message}")]
    OperationFailed {
        operation: &'static str,
        key: String,
        message: String,
    },

    /// Aggregate of every failure recorded during one bulk run / 批量操作的全部失败
    #[error("{operation} finished with {} failure(s) out of {attempted} task(s), first: {}", .failures.len(), first_failure(.failures))]
    BulkFailed {
        operation: &'static str,
        attempted: usize,
        failures: Vec<TaskFailure>,
    },

    #[error("failed to fetch {source_name} for correlation: {message}")]
    CorrelationSourceFailed { source_name: String, message: String },

    /// Non-200 status or `success=false` envelope / 上游接口返回失败
    #[error("upstream request failed with status {status}: {body}")]
    UpstreamRejected { status: u16, body: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

fn first_failure(failures: &[TaskFailure]) -> String {
    failures
        .first()
        .map(|f| f.to_string())
        .unwrap_or_else(|| "listing aborted".to_string())
}

impl GatewayError {
    /// Whether the failure means configuration is missing rather than upstream trouble
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            GatewayError::ConfigNotLoaded(_)
                | GatewayError::SourceUnavailable { .. }
                | GatewayError::ReentrantCacheAccess { .. }
        )
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::UpstreamRejected {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            body: e.to_string(),
        }
    }
}
