//! In-memory object store for tests / 测试用内存对象存储
//!
//! Records in-flight calls so concurrency limits can be asserted, and can
//! inject failures for single keys or for the listing itself.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::{CopySource, ListPage, ObjectStore, ObjectSummary};
use crate::error::{GatewayError, Result};

pub struct MemoryStore {
    objects: Mutex<BTreeMap<(String, String), Bytes>>,
    page_size: usize,
    op_delay: Duration,
    failing_keys: Mutex<HashSet<String>>,
    /// Listing calls that succeed before every further call fails
    listing_budget: Mutex<Option<usize>>,
    list_calls: AtomicUsize,
    copy_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size,
            op_delay: Duration::from_millis(2),
            failing_keys: Mutex::new(HashSet::new()),
            listing_budget: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            copy_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn put(&self, bucket: &str, key: &str, body: &[u8]) {
        self.objects
            .lock()
            .insert((bucket.to_string(), key.to_string()), Bytes::copy_from_slice(body));
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects.lock().get(&(bucket.to_string(), key.to_string())).cloned()
    }

    /// Keys of a bucket under a prefix, sorted / 前缀下的全部键
    pub fn keys(&self, bucket: &str, prefix: &str) -> Vec<String> {
        self.objects
            .lock()
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Copy or delete involving this key fails / 使指定键的操作失败
    pub fn fail_key(&self, key: &str) {
        self.failing_keys.lock().insert(key.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_keys.lock().clear();
        *self.listing_budget.lock() = None;
    }

    pub fn fail_listing_after(&self, successful_calls: usize) {
        *self.listing_budget.lock() = Some(successful_calls);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn copy_calls(&self) -> usize {
        self.copy_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Highest number of copy/delete calls seen at once / 最大并发调用数
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn track<T>(&self, key: &str, apply: impl FnOnce() -> T) -> std::result::Result<T, String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.op_delay).await;

        let result = if self.failing_keys.lock().contains(key) {
            Err(format!("injected failure for {}", key))
        } else {
            Ok(apply())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<String>,
    ) -> Result<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        {
            let mut budget = self.listing_budget.lock();
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(GatewayError::ListingFailed {
                        prefix: prefix.to_string(),
                        message: "injected listing failure".to_string(),
                    });
                }
                *remaining -= 1;
            }
        }

        // (entry, is_common_prefix, size), strictly increasing by entry
        let mut entries: Vec<(String, bool, u64)> = Vec::new();
        for ((b, key), body) in self.objects.lock().iter() {
            if b != bucket || !key.starts_with(prefix) {
                continue;
            }
            let rest = &key[prefix.len()..];
            match delimiter.and_then(|d| rest.find(d).map(|i| (i, d.len()))) {
                Some((idx, len)) => {
                    let common = format!("{}{}", prefix, &rest[..idx + len]);
                    if entries.last().map(|e| &e.0) != Some(&common) {
                        entries.push((common, true, 0));
                    }
                }
                None => entries.push((key.clone(), false, body.len() as u64)),
            }
        }

        let remaining: Vec<_> = entries
            .into_iter()
            .filter(|(entry, _, _)| continuation_token.as_ref().map_or(true, |t| entry > t))
            .collect();
        let has_more = remaining.len() > self.page_size;

        let mut page = ListPage::default();
        for (entry, is_common, size) in remaining.into_iter().take(self.page_size) {
            if has_more {
                page.next_continuation_token = Some(entry.clone());
            }
            if is_common {
                page.common_prefixes.push(entry);
            } else {
                page.objects.push(ObjectSummary {
                    key: entry,
                    size,
                    last_modified: None,
                });
            }
        }
        Ok(page)
    }

    async fn copy_object(&self, bucket: &str, source: &CopySource, target_key: &str) -> Result<()> {
        self.copy_calls.fetch_add(1, Ordering::SeqCst);
        let copied = self
            .track(&source.key, || {
                let mut objects = self.objects.lock();
                let body = objects.get(&(source.bucket.clone(), source.key.clone())).cloned();
                if let Some(body) = body.clone() {
                    objects.insert((bucket.to_string(), target_key.to_string()), body);
                }
                body.is_some()
            })
            .await;

        match copied {
            Ok(true) => Ok(()),
            Ok(false) => Err(GatewayError::OperationFailed {
                operation: "copy",
                key: source.to_string(),
                message: "NoSuchKey".to_string(),
            }),
            Err(message) => Err(GatewayError::OperationFailed {
                operation: "copy",
                key: source.to_string(),
                message,
            }),
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.track(key, || {
            self.objects.lock().remove(&(bucket.to_string(), key.to_string()));
        })
        .await
        .map_err(|message| GatewayError::OperationFailed {
            operation: "delete",
            key: key.to_string(),
            message,
        })
    }
}
