//! Pages project / KV namespace correlation / Pages项目与KV命名空间关联
//!
//! Keeps the projects whose production `KV` binding points at an existing
//! namespace that holds at least one key containing the marker, and enriches
//! that binding with the namespace details and the matching keys.

use async_trait::async_trait;

use crate::drivers::cloudflare::types::{KvBinding, KvKey, KvNamespace, PagesProject};
use crate::error::{GatewayError, Result};

/// Read-only listing calls the correlation needs / 关联所需的列表接口
#[async_trait]
pub trait CloudflareCatalog: Send + Sync {
    async fn list_pages_projects(&self) -> Result<Vec<PagesProject>>;

    async fn list_kv_namespaces(&self) -> Result<Vec<KvNamespace>>;

    async fn list_kv_keys(&self, namespace_id: &str) -> Result<Vec<KvKey>>;
}

pub struct Correlator<'a> {
    catalog: &'a dyn CloudflareCatalog,
    marker: String,
}

impl<'a> Correlator<'a> {
    pub fn new(catalog: &'a dyn CloudflareCatalog, marker: impl Into<String>) -> Self {
        Self {
            catalog,
            marker: marker.into(),
        }
    }

    /// Fetch projects and namespaces, then correlate / 获取并组合全部数据
    ///
    /// Any fetch failure aborts the whole request.
    pub async fn fetch_correlated(&self) -> Result<Vec<PagesProject>> {
        let projects = self
            .catalog
            .list_pages_projects()
            .await
            .map_err(|e| source_failed("pages projects", e))?;
        let namespaces = self
            .catalog
            .list_kv_namespaces()
            .await
            .map_err(|e| source_failed("kv namespaces", e))?;

        self.correlate(projects, &namespaces).await
    }

    /// Filter and enrich `projects` against `namespaces` / 过滤并补充项目信息
    pub async fn correlate(&self, projects: Vec<PagesProject>, namespaces: &[KvNamespace]) -> Result<Vec<PagesProject>> {
        let mut kept = Vec::new();

        for mut project in projects {
            let namespace_id = project.namespace_id().to_string();
            if namespace_id.is_empty() {
                continue;
            }
            // first match wins
            let Some(namespace) = namespaces.iter().find(|ns| ns.id == namespace_id) else {
                continue;
            };

            let keys = self
                .catalog
                .list_kv_keys(&namespace_id)
                .await
                .map_err(|e| source_failed(&format!("kv keys of namespace {}", namespace_id), e))?;

            let marked: Vec<KvKey> = keys.into_iter().filter(|k| k.name.contains(&self.marker)).collect();
            if marked.is_empty() {
                continue;
            }

            tracing::info!(
                "Found project with {} keys - Project: {}, Namespace: {}, Keys count: {}",
                self.marker,
                project.name,
                namespace.title,
                marked.len()
            );
            project.deployment_configs.production.kv_namespaces.kv = KvBinding {
                namespace_id,
                title: namespace.title.clone(),
                supports_url_encoding: namespace.supports_url_encoding,
                keys: marked,
                has_prod_version: true,
            };
            kept.push(project);
        }

        Ok(kept)
    }
}

fn source_failed(source_name: &str, e: GatewayError) -> GatewayError {
    GatewayError::CorrelationSourceFailed {
        source_name: source_name.to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeCatalog {
        projects: Vec<PagesProject>,
        namespaces: Vec<KvNamespace>,
        keys: HashMap<String, Vec<&'static str>>,
        fail_keys_for: Option<String>,
        fail_namespaces: bool,
        key_calls: AtomicUsize,
    }

    #[async_trait]
    impl CloudflareCatalog for FakeCatalog {
        async fn list_pages_projects(&self) -> Result<Vec<PagesProject>> {
            Ok(self.projects.clone())
        }

        async fn list_kv_namespaces(&self) -> Result<Vec<KvNamespace>> {
            if self.fail_namespaces {
                return Err(GatewayError::UpstreamRejected { status: 403, body: "forbidden".to_string() });
            }
            Ok(self.namespaces.clone())
        }

        async fn list_kv_keys(&self, namespace_id: &str) -> Result<Vec<KvKey>> {
            self.key_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_keys_for.as_deref() == Some(namespace_id) {
                return Err(GatewayError::UpstreamRejected { status: 500, body: "boom".to_string() });
            }
            Ok(self
                .keys
                .get(namespace_id)
                .map(|names| names.iter().map(|n| KvKey::new(*n)).collect())
                .unwrap_or_default())
        }
    }

    fn project(id: &str, namespace_id: &str) -> PagesProject {
        let mut project = PagesProject {
            id: id.to_string(),
            name: format!("project-{}", id),
            ..Default::default()
        };
        project.deployment_configs.production.kv_namespaces.kv.namespace_id = namespace_id.to_string();
        project
    }

    fn namespace(id: &str, title: &str) -> KvNamespace {
        KvNamespace {
            id: id.to_string(),
            title: title.to_string(),
            supports_url_encoding: true,
        }
    }

    #[tokio::test]
    async fn test_project_with_marker_key_is_kept_and_enriched() {
        let catalog = FakeCatalog {
            projects: vec![project("p1", "n1")],
            namespaces: vec![namespace("n1", "shop-kv")],
            keys: HashMap::from([("n1".to_string(), vec!["ProdVersion-1", "other"])]),
            ..Default::default()
        };

        let result = Correlator::new(&catalog, "ProdVersion").fetch_correlated().await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "p1");
        let binding = &result[0].deployment_configs.production.kv_namespaces.kv;
        assert_eq!(binding.namespace_id, "n1");
        assert_eq!(binding.title, "shop-kv");
        assert!(binding.supports_url_encoding);
        assert!(binding.has_prod_version);
        assert_eq!(binding.keys, vec![KvKey::new("ProdVersion-1")]);
    }

    #[tokio::test]
    async fn test_project_without_marker_key_is_dropped() {
        let catalog = FakeCatalog {
            projects: vec![project("p1", "n1")],
            namespaces: vec![namespace("n1", "shop-kv")],
            keys: HashMap::from([("n1".to_string(), vec!["other"])]),
            ..Default::default()
        };

        let result = Correlator::new(&catalog, "ProdVersion").fetch_correlated().await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_and_unbound_projects_skip_key_fetch() {
        let catalog = FakeCatalog {
            projects: vec![project("p1", "missing"), project("p2", ""), project("p3", "n2")],
            // an empty namespace id never matches, even against an empty id
            namespaces: vec![namespace("", "blank"), namespace("n2", "second")],
            keys: HashMap::from([("n2".to_string(), vec!["ProdVersion-a", "ProdVersion-b"])]),
            ..Default::default()
        };

        let result = Correlator::new(&catalog, "ProdVersion").fetch_correlated().await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "p3");
        assert_eq!(result[0].deployment_configs.production.kv_namespaces.kv.keys.len(), 2);
        assert_eq!(catalog.key_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_matching_namespace_wins() {
        let catalog = FakeCatalog {
            projects: vec![project("p1", "n1")],
            namespaces: vec![namespace("n1", "first"), namespace("n1", "second")],
            keys: HashMap::from([("n1".to_string(), vec!["ProdVersion"])]),
            ..Default::default()
        };

        let result = Correlator::new(&catalog, "ProdVersion").fetch_correlated().await.unwrap();
        assert_eq!(result[0].deployment_configs.production.kv_namespaces.kv.title, "first");
    }

    #[tokio::test]
    async fn test_key_fetch_failure_aborts_correlation() {
        let catalog = FakeCatalog {
            projects: vec![project("p1", "n1"), project("p2", "n2")],
            namespaces: vec![namespace("n1", "a"), namespace("n2", "b")],
            keys: HashMap::from([("n1".to_string(), vec!["ProdVersion-1"])]),
            fail_keys_for: Some("n2".to_string()),
            ..Default::default()
        };

        let err = Correlator::new(&catalog, "ProdVersion").fetch_correlated().await.unwrap_err();
        match err {
            GatewayError::CorrelationSourceFailed { source_name, .. } => assert!(source_name.contains("n2")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_namespace_fetch_failure_aborts_correlation() {
        let catalog = FakeCatalog {
            projects: vec![project("p1", "n1")],
            fail_namespaces: true,
            ..Default::default()
        };

        let err = Correlator::new(&catalog, "ProdVersion").fetch_correlated().await.unwrap_err();
        assert!(matches!(err, GatewayError::CorrelationSourceFailed { .. }));
        assert_eq!(catalog.key_calls.load(Ordering::SeqCst), 0);
    }
}
