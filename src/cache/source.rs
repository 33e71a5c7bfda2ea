//! Backing store for provider configuration / 配置数据源

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{AliyunCredentials, CloudflareCredentials, ProviderConfig, ProviderKind};
use crate::accounts;

/// Loads the active configuration for a provider / 加载激活的提供方配置
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load_active(&self, kind: ProviderKind) -> anyhow::Result<ProviderConfig>;
}

/// Reads the first active account row from sqlite / 从sqlite读取激活账号
#[derive(Clone)]
pub struct SqliteConfigSource {
    pool: SqlitePool,
}

impl SqliteConfigSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigSource for SqliteConfigSource {
    async fn load_active(&self, kind: ProviderKind) -> anyhow::Result<ProviderConfig> {
        match kind {
            ProviderKind::Cloudflare => {
                let account = accounts::active_cloudflare_account(&self.pool)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("no active cloudflare account"))?;
                Ok(ProviderConfig::Cloudflare(CloudflareCredentials {
                    account_id: account.account_id,
                    access_key_id: account.access_key_id,
                    access_key_secret: account.access_key_secret,
                    api_token: account.api_token,
                    environment: account.environment,
                    country_code: account.country_code,
                }))
            }
            ProviderKind::Aliyun => {
                let account = accounts::active_aliyun_account(&self.pool)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("no active aliyun account"))?;
                Ok(ProviderConfig::Aliyun(AliyunCredentials {
                    access_key_id: account.access_key_id,
                    access_key_secret: account.access_key_secret,
                    account_id: account.account_id,
                    main_account_id: account.main_account_id,
                    region: account.region,
                    environment: account.environment,
                }))
            }
        }
    }
}
