//! Cloudflare R2 driver / Cloudflare R2驱动
//!
//! `R2ClientFactory` builds a fresh `R2Store` from the cached Cloudflare
//! credentials; `shared` wraps it in a client that is dropped whenever the
//! Cloudflare config is refreshed or invalidated.

mod store;

use std::sync::Arc;

use crate::cache::{ConfigCache, ProviderKind, SharedClient};
use crate::config::CloudflareConfig;
use crate::error::Result;

pub use store::R2Store;

/// Region value accepted by R2 / R2使用的区域
pub const R2_REGION: &str = "auto";

pub type SharedR2Client = SharedClient<R2Store>;

#[derive(Clone)]
pub struct R2ClientFactory {
    cache: Arc<ConfigCache>,
    cloudflare: CloudflareConfig,
}

impl R2ClientFactory {
    pub fn new(cache: Arc<ConfigCache>, cloudflare: CloudflareConfig) -> Self {
        Self { cache, cloudflare }
    }

    /// Build a client from the current credentials / 使用当前凭证创建客户端
    ///
    /// Fails with `ConfigNotLoaded` when the cache holds no Cloudflare config.
    pub fn new_client(&self) -> Result<R2Store> {
        let creds = self.cache.cloudflare()?;
        let endpoint = self.cloudflare.r2_endpoint(&creds.account_id);
        tracing::debug!("Creating R2 client for endpoint {}", endpoint);
        R2Store::new(endpoint, &creds.access_key_id, &creds.access_key_secret)
    }

    /// Shared client subscribed to Cloudflare config changes / 订阅配置变更的共享客户端
    pub fn shared(self) -> Result<Arc<SharedR2Client>> {
        let cache = self.cache.clone();
        SharedClient::subscribe(cache, ProviderKind::Cloudflare, move || self.new_client())
    }
}
