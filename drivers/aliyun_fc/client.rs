//! Function Compute OpenAPI client / 函数计算接口客户端

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::signing::{authorization, content_md5, http_date, SignedParts};
use super::types::*;
use crate::cache::AliyunCredentials;
use crate::config::AliyunConfig;
use crate::error::{GatewayError, Result};

/// Page size used when walking `nextToken` listings / 分页大小
const FC_PAGE_LIMIT: usize = 100;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Client bound to one Aliyun account snapshot / 绑定单个阿里云账号的客户端
pub struct FcClient {
    http: Client,
    creds: AliyunCredentials,
    api_version: String,
    endpoint: String,
}

impl FcClient {
    pub fn new(creds: AliyunCredentials, config: &AliyunConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let endpoint = format!("https://{}.{}.fc.aliyuncs.com", creds.account_id, creds.region);
        Ok(Self {
            http,
            creds,
            api_version: config.api_version.clone(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn main_account_id(&self) -> &str {
        &self.creds.main_account_id
    }

    /// Build a signed request; `segments` are joined unescaped for the signature
    /// 构建带签名的请求
    fn signed(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(String, String)],
        body: Option<Vec<u8>>,
        now: DateTime<Utc>,
    ) -> Result<RequestBuilder> {
        let sign_path = format!("/{}/{}", self.api_version, segments.join("/"));
        let url_path = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = format!("{}/{}/{}", self.endpoint, self.api_version, url_path);

        let date = http_date(now);
        let body = body.unwrap_or_default();
        let md5 = content_md5(&body);
        let fc_headers = vec![("x-fc-account-id".to_string(), self.creds.main_account_id.clone())];

        let parts = SignedParts {
            method: method.as_str(),
            content_md5: &md5,
            content_type: JSON_CONTENT_TYPE,
            date: &date,
            headers: &fc_headers,
            path: &sign_path,
            query,
        };
        let auth = authorization(&self.creds.access_key_id, &self.creds.access_key_secret, &parts)?;

        let mut builder = self
            .http
            .request(method, url)
            .header("Date", date.as_str())
            .header("Content-Type", JSON_CONTENT_TYPE)
            .header("Authorization", auth);
        for (name, value) in &fc_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if !body.is_empty() {
            builder = builder.header("Content-MD5", md5).body(body);
        }
        Ok(builder)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(String, String)],
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let body = match body {
            Some(v) => Some(serde_json::to_vec(&v).map_err(|e| GatewayError::InvalidInput(e.to_string()))?),
            None => None,
        };
        let resp = self.signed(method, segments, query, body, Utc::now())?.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        parse_response(status, &text)
    }

    /// Walk a `nextToken` listing to the end / 遍历nextToken分页
    async fn list_all<P>(&self, segments: &[&str]) -> Result<Vec<P::Item>>
    where
        P: FcPage + DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut query = vec![("limit".to_string(), FC_PAGE_LIMIT.to_string())];
            if let Some(token) = next_token.take() {
                query.push(("nextToken".to_string(), token));
            }
            let page: P = self.call(Method::GET, segments, &query, None).await?;
            let (batch, next) = page.into_parts();
            items.extend(batch);
            match next {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(items)
    }

    /// List services / 获取服务列表
    pub async fn list_services(&self) -> Result<Vec<ServiceInfo>> {
        tracing::info!("Getting FC services");
        self.list_all::<ServicesPage>(&["services"]).await
    }

    /// List published versions of a service / 获取服务版本列表
    pub async fn list_service_versions(&self, service_name: &str) -> Result<Vec<ServiceVersion>> {
        tracing::info!("Getting FC versions for service: {}", service_name);
        self.list_all::<VersionsPage>(&["services", service_name, "versions"]).await
    }

    /// List functions of a service / 获取函数列表
    pub async fn list_functions(&self, service_name: &str) -> Result<Vec<FunctionInfo>> {
        tracing::info!("Getting FC functions for service: {}", service_name);
        self.list_all::<FunctionsPage>(&["services", service_name, "functions"]).await
    }

    /// List aliases of a service / 获取别名列表
    pub async fn list_aliases(&self, service_name: &str) -> Result<Vec<AliasInfo>> {
        tracing::info!("Getting FC aliases for service: {}", service_name);
        self.list_all::<AliasesPage>(&["services", service_name, "aliases"]).await
    }

    /// Point an alias at another version / 更新别名指向的版本
    pub async fn update_alias(&self, service_name: &str, alias_name: &str, version_id: &str) -> Result<AliasInfo> {
        tracing::info!(
            "Updating FC alias {} of service {} to version {}",
            alias_name,
            service_name,
            version_id
        );
        self.call(
            Method::PUT,
            &["services", service_name, "aliases", alias_name],
            &[],
            Some(json!({ "versionId": version_id })),
        )
        .await
    }

    /// Publish a new service version / 发布服务版本
    pub async fn publish_service_version(&self, service_name: &str, description: &str) -> Result<ServiceVersion> {
        tracing::info!("Publishing FC version for service: {}", service_name);
        self.call(
            Method::POST,
            &["services", service_name, "versions"],
            &[],
            Some(json!({ "description": description })),
        )
        .await
    }
}

/// 2xx bodies are decoded, everything else is an upstream rejection / 解析响应
pub fn parse_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    if !(200..300).contains(&status) {
        let body = match serde_json::from_str::<FcErrorBody>(body) {
            Ok(err) if !err.error_code.is_empty() => format!("{}: {}", err.error_code, err.error_message),
            _ => body.to_string(),
        };
        return Err(GatewayError::UpstreamRejected { status, body });
    }
    serde_json::from_str(body).map_err(|e| GatewayError::UpstreamRejected {
        status,
        body: format!("failed to parse response: {}", e),
    })
}
