//! R2 object store over rust-s3 / 基于rust-s3的R2存储实现

use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::Region;

use crate::error::{GatewayError, Result};
use crate::storage::{CopySource, ListPage, ObjectStore, ObjectSummary};

use super::R2_REGION;

/// Client bound to one Cloudflare account / 绑定单个账号的R2客户端
#[derive(Clone)]
pub struct R2Store {
    endpoint: String,
    credentials: Credentials,
}

impl std::fmt::Debug for R2Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2Store").field("endpoint", &self.endpoint).finish()
    }
}

impl R2Store {
    pub fn new(endpoint: String, access_key_id: &str, access_key_secret: &str) -> Result<Self> {
        let credentials = Credentials::new(Some(access_key_id), Some(access_key_secret), None, None, None)
            .map_err(|e| GatewayError::InvalidInput(format!("invalid R2 credentials: {}", e)))?;
        Ok(Self { endpoint, credentials })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 创建Bucket客户端
    fn bucket(&self, name: &str) -> Result<Box<Bucket>> {
        let region = Region::Custom {
            region: R2_REGION.to_string(),
            endpoint: self.endpoint.clone(),
        };
        let bucket = Bucket::new(name, region, self.credentials.clone())
            .map_err(|e| GatewayError::InvalidInput(format!("invalid bucket {}: {}", name, e)))?;
        Ok(bucket.with_path_style())
    }
}

#[async_trait]
impl ObjectStore for R2Store {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<String>,
    ) -> Result<ListPage> {
        let listing_failed = |message: String| GatewayError::ListingFailed {
            prefix: prefix.to_string(),
            message,
        };

        let (result, code) = self
            .bucket(bucket)?
            .list_page(
                prefix.to_string(),
                delimiter.map(str::to_string),
                continuation_token,
                None,
                None,
            )
            .await
            .map_err(|e| listing_failed(e.to_string()))?;

        if code != 200 {
            return Err(listing_failed(format!("ListObjectsV2 returned status {}", code)));
        }

        Ok(ListPage {
            objects: result
                .contents
                .into_iter()
                .map(|obj| ObjectSummary {
                    key: obj.key,
                    size: obj.size,
                    last_modified: Some(obj.last_modified),
                })
                .collect(),
            common_prefixes: result
                .common_prefixes
                .unwrap_or_default()
                .into_iter()
                .map(|cp| cp.prefix)
                .collect(),
            next_continuation_token: result.next_continuation_token.filter(|t| !t.is_empty()),
        })
    }

    async fn copy_object(&self, bucket: &str, source: &CopySource, target_key: &str) -> Result<()> {
        let failed = |message: String| GatewayError::OperationFailed {
            operation: "copy",
            key: source.to_string(),
            message,
        };
        // copy_object_internal only addresses keys of the bucket it is bound to
        if source.bucket != bucket {
            return Err(failed(format!("cross-bucket copy into {} is not supported", bucket)));
        }

        // from参数需要URL编码（中文等非ASCII字符）
        let encoded_src = urlencoding::encode(&source.key);
        let code = self
            .bucket(bucket)?
            .copy_object_internal(encoded_src.as_ref(), target_key)
            .await
            .map_err(|e| failed(e.to_string()))?;

        if code != 200 {
            return Err(failed(format!("CopyObject to {} returned status {}", target_key, code)));
        }
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let response = self
            .bucket(bucket)?
            .delete_object(key)
            .await
            .map_err(|e| GatewayError::OperationFailed {
                operation: "delete",
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let code = response.status_code();
        if code != 200 && code != 204 {
            return Err(GatewayError::OperationFailed {
                operation: "delete",
                key: key.to_string(),
                message: format!("DeleteObject returned status {}", code),
            });
        }
        Ok(())
    }
}
