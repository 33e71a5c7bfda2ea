//! Aliyun Function Compute driver / 阿里云函数计算驱动

mod client;
pub mod signing;
pub mod types;

use std::sync::Arc;

use crate::cache::{ConfigCache, ProviderKind, SharedClient};
use crate::config::AliyunConfig;
use crate::error::Result;

pub use client::FcClient;
pub use types::{AliasInfo, FunctionInfo, ServiceInfo, ServiceVersion};

pub type SharedFcClient = SharedClient<FcClient>;

#[derive(Clone)]
pub struct FcClientFactory {
    cache: Arc<ConfigCache>,
    aliyun: AliyunConfig,
}

impl FcClientFactory {
    pub fn new(cache: Arc<ConfigCache>, aliyun: AliyunConfig) -> Self {
        Self { cache, aliyun }
    }

    /// Build a client from the current Aliyun credentials / 使用当前凭证创建客户端
    pub fn new_client(&self) -> Result<FcClient> {
        let creds = self.cache.aliyun()?;
        tracing::debug!("Creating FC client for account {} in {}", creds.account_id, creds.region);
        FcClient::new(creds, &self.aliyun)
    }

    pub fn shared(self) -> Result<Arc<SharedFcClient>> {
        let cache = self.cache.clone();
        SharedClient::subscribe(cache, ProviderKind::Aliyun, move || self.new_client())
    }
}
