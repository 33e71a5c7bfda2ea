use serde::{Deserialize, Serialize};

/// Cloudflare account row / Cloudflare账号
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CloudflareAccount {
    pub id: i64,
    pub site_client: String,
    pub account_id: String,
    pub access_key_id: String,
    #[serde(skip_serializing)]
    pub access_key_secret: String,
    #[serde(skip_serializing)]
    pub api_token: String,
    pub environment: String,
    pub country_code: String,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudflareAccountPayload {
    pub site_client: String,
    pub account_id: String,
    pub access_key_id: String,
    pub access_key_secret: String,
    pub api_token: String,
    /// Defaults to `prod` / 默认 prod
    pub environment: Option<String>,
    /// Defaults to `global` / 默认 global
    pub country_code: Option<String>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudflareAccountUpdate {
    pub site_client: Option<String>,
    pub account_id: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub api_token: Option<String>,
    pub environment: Option<String>,
    pub country_code: Option<String>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

/// Aliyun account row / 阿里云账号
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AliyunAccount {
    pub id: i64,
    pub site_client: String,
    pub access_key_id: String,
    #[serde(skip_serializing)]
    pub access_key_secret: String,
    pub account_id: String,
    pub main_account_id: String,
    pub environment: String,
    pub region: String,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliyunAccountPayload {
    pub site_client: String,
    pub access_key_id: String,
    pub access_key_secret: String,
    pub account_id: String,
    pub main_account_id: String,
    pub environment: String,
    pub region: String,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AliyunAccountUpdate {
    pub site_client: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub account_id: Option<String>,
    pub main_account_id: Option<String>,
    pub environment: Option<String>,
    pub region: Option<String>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
}

/// Alias switch history / 别名切换记录
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AliasRecord {
    pub id: i64,
    pub service_name: String,
    pub alias_name: String,
    pub version_id: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub enabled: bool,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
