//! Provider client kept alive across requests / 跨请求复用的客户端
//!
//! The built client is tagged with the config generation it was built from
//! and dropped by an invalidation callback, so the next `get` rebuilds it from
//! the fresh credentials.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{ConfigCache, ProviderKind};
use crate::error::Result;

type Builder<C> = Box<dyn Fn() -> Result<C> + Send + Sync>;
type Slot<C> = Mutex<Option<(u64, Arc<C>)>>;

pub struct SharedClient<C> {
    cache: Arc<ConfigCache>,
    kind: ProviderKind,
    build: Builder<C>,
    slot: Arc<Slot<C>>,
}

impl<C: Send + Sync + 'static> SharedClient<C> {
    /// Create the shared client and subscribe it to config changes of `kind`
    /// 创建共享客户端并订阅配置变更
    pub fn subscribe<F>(cache: Arc<ConfigCache>, kind: ProviderKind, build: F) -> Result<Arc<Self>>
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        let slot: Arc<Slot<C>> = Arc::new(Mutex::new(None));

        let cleared = slot.clone();
        cache.register_callback(
            kind,
            Arc::new(move || {
                *cleared.lock() = None;
            }),
        )?;

        Ok(Arc::new(Self {
            cache,
            kind,
            build: Box::new(build),
            slot,
        }))
    }

    /// Cached client, rebuilt after a config change / 获取客户端（配置变更后重建）
    pub fn get(&self) -> Result<Arc<C>> {
        // the slot lock is never held while the cache is touched
        let generation = self.cache.generation(self.kind);
        if let Some((built_for, client)) = self.slot.lock().as_ref() {
            if *built_for == generation {
                return Ok(client.clone());
            }
        }

        let client = Arc::new((self.build)()?);
        *self.slot.lock() = Some((generation, client.clone()));
        tracing::debug!("Built {} client for config generation {}", self.kind, generation);
        Ok(client)
    }

    pub fn is_cached(&self) -> bool {
        self.slot.lock().is_some()
    }
}
