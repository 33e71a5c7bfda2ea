//! Paginated listings over an object store / 对象存储分页列举

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};

use super::ObjectStore;
use crate::error::Result;
use crate::utils::{self, SEPARATOR};

const DELIMITER: &str = "/";

/// Follows continuation tokens on top of `ObjectStore::list_page` / 分页列举器
#[derive(Clone)]
pub struct Paginator {
    store: Arc<dyn ObjectStore>,
}

struct WalkState {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
    token: Option<String>,
    buffered: VecDeque<String>,
    exhausted: bool,
}

impl Paginator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Sub-directories and root-level objects under a prefix / 列出一层子目录和文件
    ///
    /// An empty prefix lists the bucket root. Directory names are returned
    /// without their trailing separator.
    pub async fn list_direct_children(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let prefix = utils::normalize_dir_prefix(prefix).unwrap_or_default();
        let mut names = Vec::new();
        let mut token = None;

        loop {
            let page = self
                .store
                .list_page(bucket, &prefix, Some(DELIMITER), token.take())
                .await?;

            for common in &page.common_prefixes {
                let relative = common.strip_prefix(prefix.as_str()).unwrap_or(common);
                let name = utils::dir_display_name(relative);
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }

            for object in &page.objects {
                let relative = object.key.strip_prefix(prefix.as_str()).unwrap_or(&object.key);
                // skip the directory marker itself and anything nested
                if relative.is_empty() || relative.contains(SEPARATOR) {
                    continue;
                }
                names.push(relative.to_string());
            }

            match page.next_continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        tracing::info!("Found {} directories and root files in bucket {}", names.len(), bucket);
        Ok(names)
    }

    /// Lazily walk every key under a prefix / 惰性遍历前缀下的全部对象键
    ///
    /// Pages are fetched on demand. A listing failure is yielded once and the
    /// stream ends; keys yielded before it are not taken back.
    pub fn list_all_under_prefix(&self, bucket: &str, prefix: &str) -> BoxStream<'static, Result<String>> {
        let state = WalkState {
            store: self.store.clone(),
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            token: None,
            buffered: VecDeque::new(),
            exhausted: false,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(key) = state.buffered.pop_front() {
                    return Some((Ok(key), state));
                }
                if state.exhausted {
                    return None;
                }

                let page = state
                    .store
                    .list_page(&state.bucket, &state.prefix, None, state.token.take())
                    .await;

                match page {
                    Ok(page) => {
                        state.buffered.extend(page.objects.into_iter().map(|o| o.key));
                        state.token = page.next_continuation_token;
                        state.exhausted = state.token.is_none();
                    }
                    Err(e) => {
                        state.exhausted = true;
                        state.buffered.clear();
                        return Some((Err(e), state));
                    }
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::storage::memory::MemoryStore;
    use futures::TryStreamExt;

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::with_page_size(2));
        for key in [
            "site/a.txt",
            "site/b.txt",
            "site/css/main.css",
            "site/js/app.js",
            "site/js/vendor/lib.js",
            "root.txt",
            "other/c.txt",
        ] {
            store.put("bucket", key, key.as_bytes());
        }
        store
    }

    #[tokio::test]
    async fn test_list_all_follows_continuation_tokens() {
        let store = seeded_store();
        let paginator = Paginator::new(store.clone());

        let keys: Vec<String> = paginator
            .list_all_under_prefix("bucket", "site/")
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            keys,
            vec![
                "site/a.txt",
                "site/b.txt",
                "site/css/main.css",
                "site/js/app.js",
                "site/js/vendor/lib.js",
            ]
        );
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_list_all_is_lazy() {
        let store = seeded_store();
        let paginator = Paginator::new(store.clone());

        let mut keys = paginator.list_all_under_prefix("bucket", "site/");
        assert_eq!(store.list_calls(), 0);
        keys.next().await.unwrap().unwrap();
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_ends_stream() {
        let store = seeded_store();
        store.fail_listing_after(1);
        let paginator = Paginator::new(store.clone());

        let items: Vec<Result<String>> = paginator.list_all_under_prefix("bucket", "site/").collect().await;

        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(items[1].is_ok());
        assert!(matches!(items[2], Err(GatewayError::ListingFailed { .. })));
    }

    #[tokio::test]
    async fn test_list_direct_children_at_root() {
        let store = seeded_store();
        let paginator = Paginator::new(store);

        let mut names = paginator.list_direct_children("bucket", "").await.unwrap();
        names.sort();
        assert_eq!(names, vec!["other", "root.txt", "site"]);
    }

    #[tokio::test]
    async fn test_list_direct_children_under_prefix() {
        let store = seeded_store();
        store.put("bucket", "site/", b"");
        let paginator = Paginator::new(store);

        let mut names = paginator.list_direct_children("bucket", "site").await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt", "css", "js"]);
    }
}
