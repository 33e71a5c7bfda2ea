//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件
//!
//! Provider credentials are not part of this file; they live in the
//! account tables and flow through the config cache.

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Global configuration instance / 全局配置实例
static CONFIG: OnceCell<Arc<RwLock<AppConfig>>> = OnceCell::new();

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    pub server: ServerConfig,
    /// Database configuration / 数据库配置
    pub database: DatabaseConfig,
    /// Bulk copy/delete worker pool / 批量任务工作池
    pub bulk: BulkConfig,
    /// Cloudflare API and R2 endpoints / Cloudflare接口配置
    pub cloudflare: CloudflareConfig,
    /// Aliyun Function Compute / 阿里云函数计算配置
    pub aliyun: AliyunConfig,
    /// Session settings / 会话配置
    pub auth: AuthConfig,
    /// Zone info reported by `/system/zones` / 区域信息
    pub zones: ZonesConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
}

/// Database configuration / 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Data directory path / 数据目录路径
    pub data_dir: String,
    /// Main database file path (relative to data_dir) / 主数据库文件路径
    pub db_file: String,
}

/// Bulk worker pool configuration / 批量任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Concurrent workers per bulk operation / 并发工作者数量
    pub worker_count: usize,
    /// Bounded task queue capacity / 任务队列容量
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudflareConfig {
    /// Account scoped API base / 账号级API地址
    pub api_base: String,
    /// R2 endpoint, `{account_id}` is substituted / R2端点模板
    pub r2_endpoint_template: String,
    /// KV key substring used by the pages correlation / 关联标记
    pub correlation_marker: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliyunConfig {
    /// FC OpenAPI version / 函数计算API版本
    pub api_version: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in hours / 会话有效期（小时）
    pub session_ttl_hours: i64,
    /// Username of the seeded administrator / 默认管理员用户名
    pub admin_username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesConfig {
    pub environment: String,
    pub country_codes: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            db_file: "cloudops.db".to_string(),
        }
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            worker_count: 50,
            queue_capacity: 100,
        }
    }
}

impl Default for CloudflareConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.cloudflare.com/client/v4/accounts".to_string(),
            r2_endpoint_template: "https://{account_id}.r2.cloudflarestorage.com".to_string(),
            correlation_marker: "ProdVersion".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for AliyunConfig {
    fn default() -> Self {
        Self {
            api_version: "2021-04-06".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 168,
            admin_username: "admin".to_string(),
        }
    }
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self {
            environment: "pre".to_string(),
            country_codes: vec!["US".to_string(), "BZ".to_string()],
        }
    }
}

impl CloudflareConfig {
    /// R2 endpoint for an account / 获取账号的R2端点
    pub fn r2_endpoint(&self, account_id: &str) -> String {
        self.r2_endpoint_template.replace("{account_id}", account_id)
    }

    /// Account scoped API url / 获取账号级API地址
    pub fn account_url(&self, account_id: &str, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.api_base.trim_end_matches('/'),
            account_id,
            path.trim_start_matches('/')
        )
    }
}

impl AppConfig {
    /// Get the full database URL, `DATABASE_URL` wins / 获取完整的数据库URL
    pub fn get_database_url(&self) -> String {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                return url;
            }
        }
        let db_path = Path::new(&self.database.data_dir).join(&self.database.db_file);
        format!("sqlite:{}?mode=rwc", db_path.to_string_lossy())
    }

    /// Get the full data directory path / 获取完整的数据目录路径
    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.database.data_dir)
    }

    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Get the config file path / 获取配置文件路径
fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config() -> Result<AppConfig, String> {
    let config_path = get_config_path();

    if config_path.exists() {
        // Load existing config / 加载现有配置
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        // Create default config / 创建默认配置
        let config = AppConfig::default();
        save_config(&config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(config: &AppConfig) -> Result<(), String> {
    let config_path = get_config_path();

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(&config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}

/// Initialize global configuration / 初始化全局配置
pub fn init_config() -> Result<Arc<RwLock<AppConfig>>, String> {
    let config = load_config()?;

    let config_arc = Arc::new(RwLock::new(config));

    CONFIG
        .set(config_arc.clone())
        .map_err(|_| "Config already initialized".to_string())?;

    Ok(config_arc)
}

/// Get global configuration instance / 获取全局配置实例
pub fn get_config() -> Arc<RwLock<AppConfig>> {
    CONFIG
        .get_or_init(|| {
            let config = load_config().unwrap_or_default();
            Arc::new(RwLock::new(config))
        })
        .clone()
}

/// Get a read-only snapshot of current config / 获取当前配置的只读快照
pub fn config() -> AppConfig {
    get_config().read().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"server":{"host":"127.0.0.1","port":9000}}"#).unwrap();
        assert_eq!(config.get_bind_address(), "127.0.0.1:9000");
        assert_eq!(config.bulk.worker_count, 50);
        assert_eq!(config.bulk.queue_capacity, 100);
        assert_eq!(config.cloudflare.correlation_marker, "ProdVersion");
        assert_eq!(config.aliyun.api_version, "2021-04-06");
        assert_eq!(config.zones.environment, "pre");
        assert_eq!(config.zones.country_codes, vec!["US", "BZ"]);
    }

    #[test]
    fn test_cloudflare_urls() {
        let cf = CloudflareConfig::default();
        assert_eq!(cf.r2_endpoint("abc"), "https://abc.r2.cloudflarestorage.com");
        assert_eq!(
            cf.account_url("abc", "/pages/projects"),
            "https://api.cloudflare.com/client/v4/accounts/abc/pages/projects"
        );
    }
}
