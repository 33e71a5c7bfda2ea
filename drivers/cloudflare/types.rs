//! Cloudflare API data type definitions / Cloudflare数据类型定义

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, Result};

/// Common response envelope / 通用响应结构
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct CfResponse<T> {
    pub success: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub result: Vec<T>,
    /// Cursor paging, only some listings carry it / 游标分页信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_info: Option<ResultInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// `null` lists decode as empty / null 按空列表处理
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl<T> CfResponse<T> {
    /// Successful envelope built locally / 本地构造的成功响应
    pub fn ok(result: Vec<T>) -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            messages: Vec::new(),
            result,
            result_info: None,
        }
    }

    /// Cursor of the next page, if any / 下一页游标
    pub fn next_cursor(&self) -> Option<String> {
        self.result_info
            .as_ref()
            .and_then(|info| info.cursor.clone())
            .filter(|cursor| !cursor.is_empty())
    }

    /// `success=false` is a hard failure / success=false 视为失败
    pub fn into_result(self) -> Result<Vec<T>> {
        if self.success {
            Ok(self.result)
        } else {
            Err(GatewayError::UpstreamRejected {
                status: 200,
                body: serde_json::to_string(&self.errors).unwrap_or_default(),
            })
        }
    }
}

/// KV namespace / KV命名空间
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KvNamespace {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub supports_url_encoding: bool,
}

/// KV key / KV键
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvKey {
    pub name: String,
}

impl KvKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Pages project / Pages项目
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PagesProject {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subdomain: String,
    #[serde(default)]
    pub created_on: String,
    #[serde(default)]
    pub modified_on: String,
    #[serde(default)]
    pub production_branch: String,
    #[serde(default)]
    pub deployment_configs: DeploymentConfigs,
}

impl PagesProject {
    /// Namespace bound as `KV` in production / 生产环境绑定的KV命名空间ID
    pub fn namespace_id(&self) -> &str {
        &self.deployment_configs.production.kv_namespaces.kv.namespace_id
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentConfigs {
    #[serde(default)]
    pub production: ProductionConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionConfig {
    #[serde(default)]
    pub kv_namespaces: KvBindings,
    #[serde(default)]
    pub r2_buckets: R2Bindings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KvBindings {
    #[serde(rename = "KV", default)]
    pub kv: KvBinding,
}

/// Namespace binding, enriched by the correlation / KV绑定信息（关联后补充）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KvBinding {
    #[serde(default)]
    pub namespace_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub supports_url_encoding: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<KvKey>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_prod_version: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct R2Bindings {
    #[serde(rename = "R2_ASSETS", default)]
    pub assets: R2Binding,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct R2Binding {
    #[serde(default)]
    pub name: String,
}

/// KV value, decoded from an envelope or passed through raw / KV值
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KvValue {
    pub value: String,
}

/// Decode a KV value body / 解析KV值响应
///
/// Bodies shaped like the API envelope (a JSON object carrying `success`)
/// are unwrapped; anything else is the stored value itself.
pub fn decode_kv_value(body: &str) -> Result<KvValue> {
    #[derive(Deserialize)]
    struct ValueItem {
        #[serde(alias = "Value")]
        value: String,
    }

    let is_envelope = serde_json::from_str::<Value>(body)
        .map(|v| v.get("success").map_or(false, Value::is_boolean))
        .unwrap_or(false);
    if !is_envelope {
        return Ok(KvValue { value: body.to_string() });
    }

    let envelope: CfResponse<ValueItem> = serde_json::from_str(body).map_err(|e| GatewayError::UpstreamRejected {
        status: 200,
        body: format!("failed to parse response: {}", e),
    })?;
    let value = envelope
        .into_result()?
        .into_iter()
        .next()
        .map(|item| item.value)
        .unwrap_or_default();
    Ok(KvValue { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_project_decodes_bindings() {
        let body = r#"{
            "success": true,
            "errors": [],
            "messages": [],
            "result": [{
                "id": "p1",
                "name": "shop",
                "subdomain": "shop.pages.dev",
                "production_branch": "main",
                "deployment_configs": {
                    "production": {
                        "kv_namespaces": {"KV": {"namespace_id": "n1"}},
                        "r2_buckets": {"R2_ASSETS": {"name": "shop-assets"}}
                    }
                }
            }, {
                "id": "p2",
                "name": "bare"
            }]
        }"#;

        let projects = serde_json::from_str::<CfResponse<PagesProject>>(body)
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(projects[0].namespace_id(), "n1");
        assert_eq!(projects[0].deployment_configs.production.r2_buckets.assets.name, "shop-assets");
        assert_eq!(projects[1].namespace_id(), "");
    }

    #[test]
    fn test_unsuccessful_envelope_is_rejected() {
        let body = r#"{"success": false, "errors": [{"code": 10000, "message": "Authentication error"}], "messages": [], "result": null}"#;
        let err = serde_json::from_str::<CfResponse<KvNamespace>>(body)
            .unwrap()
            .into_result()
            .unwrap_err();
        assert!(err.to_string().contains("Authentication error"));
    }

    #[test]
    fn test_unenriched_binding_omits_extras() {
        let binding = KvBinding {
            namespace_id: "n1".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&binding).unwrap();
        assert_eq!(json, serde_json::json!({"namespace_id": "n1"}));
    }

    #[test]
    fn test_decode_kv_value() {
        assert_eq!(decode_kv_value("v1.2.3").unwrap().value, "v1.2.3");
        // JSON values that are not envelopes stay raw
        assert_eq!(decode_kv_value(r#"{"build": 7}"#).unwrap().value, r#"{"build": 7}"#);
        let envelope = r#"{"success": true, "errors": [], "messages": [], "result": [{"Value": "v2"}]}"#;
        assert_eq!(decode_kv_value(envelope).unwrap().value, "v2");
        assert!(decode_kv_value(r#"{"success": false, "errors": ["nope"]}"#).is_err());
    }
}
