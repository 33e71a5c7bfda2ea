//! Cloudflare account API client / Cloudflare账号接口客户端

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::types::*;
use crate::cache::ConfigCache;
use crate::config::CloudflareConfig;
use crate::correlate::CloudflareCatalog;
use crate::error::{GatewayError, Result};

/// Page size of the KV keys listing / KV键列表分页大小
const KV_KEYS_PAGE_LIMIT: usize = 1000;

/// Bearer-token client; credentials are read from the cache per call
/// 使用缓存凭证的Cloudflare客户端
#[derive(Clone)]
pub struct CloudflareClient {
    http: Client,
    cache: Arc<ConfigCache>,
    config: CloudflareConfig,
}

impl CloudflareClient {
    pub fn new(cache: Arc<ConfigCache>, config: CloudflareConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, cache, config })
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let creds = self.cache.cloudflare()?;
        let url = self.config.account_url(&creds.account_id, path);
        Ok(self.http.request(method, url).bearer_auth(&creds.api_token))
    }

    async fn get_envelope<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<CfResponse<T>> {
        let resp = self
            .request(Method::GET, path)?
            .header("Content-Type", "application/json")
            .query(query)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        parse_envelope(status, &body)
    }

    /// List Pages projects / 获取Pages项目列表
    pub async fn pages_projects(&self) -> Result<Vec<PagesProject>> {
        tracing::info!("Getting Pages projects");
        self.get_envelope::<PagesProject>("pages/projects", &[]).await?.into_result()
    }

    /// List KV namespaces / 获取KV命名空间列表
    pub async fn kv_namespaces(&self) -> Result<Vec<KvNamespace>> {
        tracing::info!("Getting KV namespaces");
        self.get_envelope::<KvNamespace>("storage/kv/namespaces", &[]).await?.into_result()
    }

    /// List every key of a namespace, following the cursor / 获取命名空间的全部键
    pub async fn kv_keys(&self, namespace_id: &str) -> Result<Vec<KvKey>> {
        tracing::info!("Getting KV keys for namespace: {}", namespace_id);
        let path = format!("storage/kv/namespaces/{}/keys", namespace_id);
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("limit", KV_KEYS_PAGE_LIMIT.to_string())];
            if let Some(c) = cursor.take() {
                query.push(("cursor", c));
            }
            let page = self.get_envelope::<KvKey>(&path, &query).await?;
            let next = page.next_cursor();
            keys.extend(page.into_result()?);
            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        Ok(keys)
    }

    /// Read a KV value / 获取KV值
    pub async fn kv_value(&self, namespace_id: &str, key: &str) -> Result<KvValue> {
        tracing::info!("Getting KV key value for namespace: {}, key: {}", namespace_id, key);
        let path = format!("storage/kv/namespaces/{}/values/{}", namespace_id, urlencoding::encode(key));
        let resp = self.request(Method::GET, &path)?.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        if status != 200 {
            return Err(GatewayError::UpstreamRejected { status, body });
        }
        decode_kv_value(&body)
    }

    /// Write a KV value as plain text / 更新KV值
    pub async fn put_kv_value(&self, namespace_id: &str, key: &str, value: String) -> Result<CfResponse<Value>> {
        tracing::info!("Updating KV key value for namespace: {}, key: {}", namespace_id, key);
        let path = format!("storage/kv/namespaces/{}/values/{}", namespace_id, urlencoding::encode(key));
        let resp = self
            .request(Method::PUT, &path)?
            .header("Content-Type", "text/plain")
            .body(value)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        let envelope: CfResponse<Value> = parse_envelope(status, &body)?;
        if !envelope.success {
            return Err(GatewayError::UpstreamRejected {
                status,
                body: serde_json::to_string(&envelope.errors).unwrap_or_default(),
            });
        }
        Ok(envelope)
    }
}

/// Non-200 or undecodable bodies are hard failures / 解析通用响应
pub fn parse_envelope<T: DeserializeOwned>(status: u16, body: &str) -> Result<CfResponse<T>> {
    if status != 200 {
        return Err(GatewayError::UpstreamRejected {
            status,
            body: body.to_string(),
        });
    }
    serde_json::from_str(body).map_err(|e| GatewayError::UpstreamRejected {
        status,
        body: format!("failed to parse response: {}", e),
    })
}

#[async_trait]
impl CloudflareCatalog for CloudflareClient {
    async fn list_pages_projects(&self) -> Result<Vec<PagesProject>> {
        self.pages_projects().await
    }

    async fn list_kv_namespaces(&self) -> Result<Vec<KvNamespace>> {
        self.kv_namespaces().await
    }

    async fn list_kv_keys(&self, namespace_id: &str) -> Result<Vec<KvKey>> {
        self.kv_keys(namespace_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::loaded_cache;
    use crate::cache::{ConfigCache, ProviderKind};
    use crate::cache::testing::StaticSource;

    #[test]
    fn test_parse_envelope_rejects_non_200() {
        let err = parse_envelope::<KvKey>(403, "forbidden").unwrap_err();
        match err {
            GatewayError::UpstreamRejected { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "forbidden");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_envelope_reads_cursor() {
        let body = r#"{"success": true, "errors": [], "messages": [], "result": [{"name": "ProdVersion"}],
                       "result_info": {"count": 1, "cursor": "abc"}}"#;
        let envelope = parse_envelope::<KvKey>(200, body).unwrap();
        assert_eq!(envelope.next_cursor().as_deref(), Some("abc"));

        let last = r#"{"success": true, "result": [], "result_info": {"count": 0, "cursor": ""}}"#;
        assert!(parse_envelope::<KvKey>(200, last).unwrap().next_cursor().is_none());
    }

    #[test]
    fn test_parse_envelope_rejects_garbage() {
        assert!(parse_envelope::<KvNamespace>(200, "<html>").is_err());
    }

    #[tokio::test]
    async fn test_request_uses_account_url_and_token() {
        let cache = loaded_cache().await;
        let client = CloudflareClient::new(cache, CloudflareConfig::default()).unwrap();
        let request = client.request(Method::GET, "pages/projects").unwrap().build().unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://api.cloudflare.com/client/v4/accounts/acc-1/pages/projects"
        );
        assert_eq!(request.headers()["authorization"], "Bearer token");
    }

    #[tokio::test]
    async fn test_request_without_config_fails() {
        let cache = Arc::new(ConfigCache::new(Arc::new(StaticSource::new())));
        let client = CloudflareClient::new(cache, CloudflareConfig::default()).unwrap();
        let err = client.request(Method::GET, "pages/projects").unwrap_err();
        assert!(matches!(err, GatewayError::ConfigNotLoaded(ProviderKind::Cloudflare)));
    }
}
