//! Object store seam and bulk manipulation engine / 对象存储接口与批量操作引擎
//!
//! `ObjectStore` exposes only the primitive S3 calls (ListObjectsV2 page,
//! CopyObject, DeleteObject). Directory semantics live on top of it in
//! `Paginator` and `BulkTaskExecutor`.

pub mod bulk;
pub mod paginator;

#[cfg(test)]
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use bulk::{BulkReport, BulkTaskExecutor};
pub use paginator::Paginator;

/// Object entry from a listing page / 列表页中的对象
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// One ListObjectsV2 page / 单页列表结果
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    /// Sub-directory prefixes, only filled when a delimiter is given / 公共前缀（子目录）
    pub common_prefixes: Vec<String>,
    /// Cursor for the next page, None on the last page / 下一页游标
    pub next_continuation_token: Option<String>,
}

/// Copy source reference, displayed as `bucket/key` / 复制源引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySource {
    pub bucket: String,
    pub key: String,
}

impl CopySource {
    pub fn new(bucket: &str, key: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

impl fmt::Display for CopySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Copy one object to a rebased key / 复制任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    pub source_key: String,
    pub target_key: String,
}

/// Delete one object / 删除任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTask {
    pub key: String,
}

/// S3-compatible primitive operations / S3兼容存储原语
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a single ListObjectsV2 page / 获取单页对象列表
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<String>,
    ) -> Result<ListPage>;

    /// Server-side copy within the store / 服务端复制
    async fn copy_object(&self, bucket: &str, source: &CopySource, target_key: &str) -> Result<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;
}
