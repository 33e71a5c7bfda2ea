use std::sync::Arc;

use sqlx::SqlitePool;

use cloudops_backend::cache::ConfigCache;
use cloudops_backend::config::AppConfig;
use cloudops_backend::drivers::aliyun_fc::SharedFcClient;
use cloudops_backend::drivers::cloudflare::CloudflareClient;
use cloudops_backend::drivers::r2::SharedR2Client;

pub struct AppState {
    pub db: SqlitePool,
    pub config: AppConfig,
    pub cache: Arc<ConfigCache>,
    /// R2 client rebuilt after Cloudflare config changes / R2客户端
    pub r2: Arc<SharedR2Client>,
    /// FC client rebuilt after Aliyun config changes / 函数计算客户端
    pub fc: Arc<SharedFcClient>,
    pub cloudflare: CloudflareClient,
}
