//! Provider configuration cache / 提供方配置缓存
//!
//! Holds at most one credential bundle per provider kind. Values are fetched
//! explicitly via `refresh`, replaced wholesale and never mutated in place.
//! Dependents subscribe with `register_callback` and are notified
//! synchronously, in registration order, while the exclusive section is held.
//!
//! Callbacks must be non-blocking and must not call back into the cache.
//! Reentry from the notifying thread is detected and rejected with
//! `GatewayError::ReentrantCacheAccess` instead of deadlocking. The one
//! exception is `generation`, which lives outside the lock and can be read
//! from anywhere.
//!
//! Refreshes of the same kind are serialized from fetch to swap, so the last
//! refresh to start is the one whose snapshot stays cached.

pub mod shared;
pub mod source;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};
use crate::utils::mask_secret;

pub use shared::SharedClient;
pub use source::{ConfigSource, SqliteConfigSource};

/// Provider kind / 云厂商类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Cloudflare,
    Aliyun,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Cloudflare, ProviderKind::Aliyun];

    fn index(self) -> usize {
        match self {
            ProviderKind::Cloudflare => 0,
            ProviderKind::Aliyun => 1,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Cloudflare => write!(f, "cloudflare"),
            ProviderKind::Aliyun => write!(f, "aliyun"),
        }
    }
}

/// Cloudflare account credentials (R2 access keys + API token) / Cloudflare凭证
#[derive(Clone, Serialize, Deserialize)]
pub struct CloudflareCredentials {
    pub account_id: String,
    pub access_key_id: String,
    pub access_key_secret: String,
    pub api_token: String,
    pub environment: String,
    pub country_code: String,
}

impl fmt::Debug for CloudflareCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareCredentials")
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &mask_secret(&self.access_key_secret))
            .field("api_token", &mask_secret(&self.api_token))
            .field("environment", &self.environment)
            .finish()
    }
}

/// Aliyun account credentials for Function Compute / 阿里云凭证
#[derive(Clone, Serialize, Deserialize)]
pub struct AliyunCredentials {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub account_id: String,
    pub main_account_id: String,
    pub region: String,
    pub environment: String,
}

impl fmt::Debug for AliyunCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AliyunCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &mask_secret(&self.access_key_secret))
            .field("account_id", &self.account_id)
            .field("main_account_id", &self.main_account_id)
            .field("region", &self.region)
            .finish()
    }
}

/// Immutable credential bundle for one provider / 单个提供方的不可变配置
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Cloudflare(CloudflareCredentials),
    Aliyun(AliyunCredentials),
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::Cloudflare(_) => ProviderKind::Cloudflare,
            ProviderConfig::Aliyun(_) => ProviderKind::Aliyun,
        }
    }
}

/// Invalidation callback, invoked on refresh and invalidate / 配置变更回调
pub type InvalidationCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct CacheState {
    values: HashMap<ProviderKind, Arc<ProviderConfig>>,
    callbacks: HashMap<ProviderKind, Vec<InvalidationCallback>>,
}

/// Clears the notifier marker even if a callback panics
struct NotifyGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for NotifyGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

pub struct ConfigCache {
    source: Arc<dyn ConfigSource>,
    state: RwLock<CacheState>,
    /// Bumped under the write guard, readable without it / 配置版本号
    generations: [AtomicU64; 2],
    /// One in-flight refresh per kind / 每种配置同时只有一个刷新
    refreshing: [tokio::sync::Mutex<()>; 2],
    /// Thread currently running callbacks / 正在执行回调的线程
    notifying: Mutex<Option<ThreadId>>,
}

impl ConfigCache {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            source,
            state: RwLock::new(CacheState::default()),
            generations: [AtomicU64::new(0), AtomicU64::new(0)],
            refreshing: [tokio::sync::Mutex::new(()), tokio::sync::Mutex::new(())],
            notifying: Mutex::new(None),
        }
    }

    fn guard_reentry(&self, operation: &'static str) -> Result<()> {
        let current = std::thread::current().id();
        if *self.notifying.lock() == Some(current) {
            tracing::error!("Config cache re-entered from callback during {}", operation);
            return Err(GatewayError::ReentrantCacheAccess { operation });
        }
        Ok(())
    }

    /// Get the cached value, never loads implicitly / 获取缓存值（不会隐式加载）
    pub fn get(&self, kind: ProviderKind) -> Result<Arc<ProviderConfig>> {
        self.guard_reentry("get")?;
        self.state
            .read()
            .values
            .get(&kind)
            .cloned()
            .ok_or(GatewayError::ConfigNotLoaded(kind))
    }

    /// Snapshot of the active Cloudflare credentials / 当前Cloudflare凭证
    pub fn cloudflare(&self) -> Result<CloudflareCredentials> {
        match &*self.get(ProviderKind::Cloudflare)? {
            ProviderConfig::Cloudflare(c) => Ok(c.clone()),
            ProviderConfig::Aliyun(_) => Err(GatewayError::ConfigNotLoaded(ProviderKind::Cloudflare)),
        }
    }

    /// Snapshot of the active Aliyun credentials / 当前阿里云凭证
    pub fn aliyun(&self) -> Result<AliyunCredentials> {
        match &*self.get(ProviderKind::Aliyun)? {
            ProviderConfig::Aliyun(c) => Ok(c.clone()),
            ProviderConfig::Cloudflare(_) => Err(GatewayError::ConfigNotLoaded(ProviderKind::Aliyun)),
        }
    }

    /// Number of refresh/invalidate events seen for a kind / 配置版本号
    ///
    /// Safe to call from a callback; it already reflects the change being notified.
    pub fn generation(&self, kind: ProviderKind) -> u64 {
        self.generations[kind.index()].load(Ordering::SeqCst)
    }

    fn bump_generation(&self, kind: ProviderKind) {
        self.generations[kind.index()].fetch_add(1, Ordering::SeqCst);
    }

    /// Fetch a fresh value and swap it in, then notify / 刷新配置并通知订阅者
    ///
    /// The fetch runs outside the read/write lock but inside the per-kind
    /// refresh lock. On failure the previous value is kept and no callback runs.
    pub async fn refresh(&self, kind: ProviderKind) -> Result<Arc<ProviderConfig>> {
        self.guard_reentry("refresh")?;
        let _refreshing = self.refreshing[kind.index()].lock().await;

        let fresh = self
            .source
            .load_active(kind)
            .await
            .map_err(|e| GatewayError::SourceUnavailable { kind, message: e.to_string() })?;

        if fresh.kind() != kind {
            return Err(GatewayError::SourceUnavailable {
                kind,
                message: format!("source returned {} config", fresh.kind()),
            });
        }

        let fresh = Arc::new(fresh);
        let mut state = self.state.write();
        state.values.insert(kind, fresh.clone());
        self.bump_generation(kind);
        self.notify(&state, kind);
        drop(state);

        tracing::info!("Refreshed {} config", kind);
        Ok(fresh)
    }

    /// Refresh every provider kind; keeps going after a failure / 刷新全部配置
    pub async fn refresh_all(&self) -> Result<()> {
        let mut first_error = None;
        for kind in ProviderKind::ALL {
            if let Err(e) = self.refresh(kind).await {
                tracing::warn!("Failed to refresh {} config: {}", kind, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Clear the cached value and notify / 使配置失效并通知
    pub fn invalidate(&self, kind: ProviderKind) -> Result<()> {
        self.guard_reentry("invalidate")?;

        let mut state = self.state.write();
        state.values.remove(&kind);
        self.bump_generation(kind);
        self.notify(&state, kind);

        tracing::info!("Invalidated {} config", kind);
        Ok(())
    }

    /// Append a callback; the registry lives as long as the cache / 注册回调
    pub fn register_callback(&self, kind: ProviderKind, callback: InvalidationCallback) -> Result<()> {
        self.guard_reentry("register_callback")?;
        self.state.write().callbacks.entry(kind).or_default().push(callback);
        Ok(())
    }

    // Runs with the write guard held by the caller.
    fn notify(&self, state: &CacheState, kind: ProviderKind) {
        let Some(callbacks) = state.callbacks.get(&kind) else {
            return;
        };
        *self.notifying.lock() = Some(std::thread::current().id());
        let _guard = NotifyGuard(&self.notifying);
        for callback in callbacks {
            callback();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback(counter: &Arc<AtomicUsize>) -> InvalidationCallback {
        let counter = counter.clone();
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_get_before_refresh_fails() {
        let cache = ConfigCache::new(Arc::new(StaticSource::new()));
        let err = cache.get(ProviderKind::Cloudflare).unwrap_err();
        assert!(matches!(err, GatewayError::ConfigNotLoaded(ProviderKind::Cloudflare)));
    }

    #[tokio::test]
    async fn test_get_never_loads_implicitly() {
        let source = Arc::new(StaticSource::new());
        let cache = ConfigCache::new(source.clone());
        let _ = cache.get(ProviderKind::Aliyun);
        let _ = cache.cloudflare();
        assert_eq!(source.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_then_invalidate() {
        let cache = ConfigCache::new(Arc::new(StaticSource::new()));
        let counter = Arc::new(AtomicUsize::new(0));
        cache.register_callback(ProviderKind::Cloudflare, counting_callback(&counter)).unwrap();
        cache.register_callback(ProviderKind::Cloudflare, counting_callback(&counter)).unwrap();

        cache.refresh(ProviderKind::Cloudflare).await.unwrap();
        assert_eq!(cache.cloudflare().unwrap().account_id, "acc-1");
        // each registered callback exactly once
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        cache.invalidate(ProviderKind::Cloudflare).unwrap();
        assert!(cache.get(ProviderKind::Cloudflare).is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_callbacks_are_per_kind_and_ordered() {
        let cache = ConfigCache::new(Arc::new(StaticSource::new()));
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            cache
                .register_callback(ProviderKind::Aliyun, Arc::new(move || order.lock().push(i)))
                .unwrap();
        }
        let cf_counter = Arc::new(AtomicUsize::new(0));
        cache.register_callback(ProviderKind::Cloudflare, counting_callback(&cf_counter)).unwrap();

        cache.refresh(ProviderKind::Aliyun).await.unwrap();
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(cf_counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_value() {
        let source = Arc::new(StaticSource::new());
        let cache = ConfigCache::new(source.clone());
        let counter = Arc::new(AtomicUsize::new(0));
        cache.register_callback(ProviderKind::Cloudflare, counting_callback(&counter)).unwrap();

        cache.refresh(ProviderKind::Cloudflare).await.unwrap();
        let generation = cache.generation(ProviderKind::Cloudflare);

        *source.cloudflare.lock() = None;
        let err = cache.refresh(ProviderKind::Cloudflare).await.unwrap_err();
        assert!(matches!(err, GatewayError::SourceUnavailable { .. }));
        assert_eq!(cache.cloudflare().unwrap().account_id, "acc-1");
        assert_eq!(cache.generation(ProviderKind::Cloudflare), generation);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_wholesale() {
        let source = Arc::new(StaticSource::new());
        let cache = ConfigCache::new(source.clone());
        let before = cache.refresh(ProviderKind::Cloudflare).await.unwrap();

        *source.cloudflare.lock() = Some(cloudflare_creds("acc-2"));
        cache.refresh(ProviderKind::Cloudflare).await.unwrap();

        // old snapshot is untouched
        match &*before {
            ProviderConfig::Cloudflare(c) => assert_eq!(c.account_id, "acc-1"),
            _ => panic!("wrong kind"),
        }
        assert_eq!(cache.cloudflare().unwrap().account_id, "acc-2");
        assert_eq!(cache.generation(ProviderKind::Cloudflare), 2);
    }

    #[tokio::test]
    async fn test_refresh_all_continues_after_failure() {
        let source = Arc::new(StaticSource::new());
        *source.cloudflare.lock() = None;
        let cache = ConfigCache::new(source);
        assert!(cache.refresh_all().await.is_err());
        assert!(cache.aliyun().is_ok());
        assert!(cache.cloudflare().is_err());
    }

    #[tokio::test]
    async fn test_reentrant_callback_is_rejected() {
        let cache = Arc::new(ConfigCache::new(Arc::new(StaticSource::new())));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&cache);
        let seen_in_cb = seen.clone();
        cache
            .register_callback(
                ProviderKind::Cloudflare,
                Arc::new(move || {
                    if let Some(cache) = weak.upgrade() {
                        let invalidate = cache.invalidate(ProviderKind::Cloudflare);
                        let get = cache.get(ProviderKind::Cloudflare);
                        seen_in_cb.lock().push((invalidate.is_err(), get.is_err()));
                    }
                }),
            )
            .unwrap();

        cache.refresh(ProviderKind::Cloudflare).await.unwrap();
        assert_eq!(*seen.lock(), vec![(true, true)]);

        // outside the callback the cache is usable again
        assert!(cache.get(ProviderKind::Cloudflare).is_ok());
    }

    #[tokio::test]
    async fn test_generation_is_readable_from_callback() {
        let cache = Arc::new(ConfigCache::new(Arc::new(StaticSource::new())));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&cache);
        let seen_in_cb = seen.clone();
        cache
            .register_callback(
                ProviderKind::Aliyun,
                Arc::new(move || {
                    if let Some(cache) = weak.upgrade() {
                        seen_in_cb.lock().push(cache.generation(ProviderKind::Aliyun));
                    }
                }),
            )
            .unwrap();

        cache.refresh(ProviderKind::Aliyun).await.unwrap();
        cache.invalidate(ProviderKind::Aliyun).unwrap();

        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(cache.generation(ProviderKind::Aliyun), 2);
        assert_eq!(cache.generation(ProviderKind::Cloudflare), 0);
    }

    /// Each load sees the account table as it was when the load started;
    /// the first load is the slow one / 第一次加载较慢的配置源
    struct SlowFirstSource {
        loads: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ConfigSource for SlowFirstSource {
        async fn load_active(&self, _kind: ProviderKind) -> anyhow::Result<ProviderConfig> {
            let ordinal = self.loads.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if ordinal == 0 {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(ProviderConfig::Cloudflare(cloudflare_creds(&format!("acc-{}", ordinal + 1))))
        }
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_keep_latest_snapshot() {
        let source = Arc::new(SlowFirstSource {
            loads: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let cache = ConfigCache::new(source.clone());

        let (first, second) = tokio::join!(
            cache.refresh(ProviderKind::Cloudflare),
            cache.refresh(ProviderKind::Cloudflare)
        );
        first.unwrap();
        second.unwrap();

        assert_eq!(cache.cloudflare().unwrap().account_id, "acc-2");
        assert_eq!(cache.generation(ProviderKind::Cloudflare), 2);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
