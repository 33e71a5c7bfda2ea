//! Bounded worker pool for recursive copy/delete / 批量复制删除工作池
//!
//! A single producer walks the listing under a directory prefix and pushes
//! tasks into a bounded queue (blocking when it is full). A fixed number of
//! workers drain the queue concurrently. Every failure is recorded and the run
//! always goes to completion: a failed task neither stops its siblings nor the
//! producer, and nothing already applied is rolled back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use super::{CopySource, CopyTask, DeleteTask, ObjectStore, Paginator};
use crate::config::BulkConfig;
use crate::error::{GatewayError, Result, TaskFailure};
use crate::utils;

/// Work item carried by the queue / 队列中的任务
#[derive(Debug, Clone)]
enum BulkTask {
    Copy(CopyTask),
    Delete(DeleteTask),
}

impl BulkTask {
    fn key(&self) -> &str {
        match self {
            BulkTask::Copy(task) => &task.source_key,
            BulkTask::Delete(task) => &task.key,
        }
    }
}

/// Outcome of a successful bulk run / 批量操作结果
#[derive(Debug, Clone, Serialize)]
pub struct BulkReport {
    pub operation: &'static str,
    pub bucket: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Tasks applied / 已执行任务数
    pub tasks: usize,
}

pub struct BulkTaskExecutor {
    store: Arc<dyn ObjectStore>,
    paginator: Paginator,
    worker_count: usize,
    queue_capacity: usize,
}

impl BulkTaskExecutor {
    pub fn new(store: Arc<dyn ObjectStore>, config: &BulkConfig) -> Self {
        Self::with_limits(store, config.worker_count, config.queue_capacity)
    }

    /// Zero limits are raised to one / 数量为0时按1处理
    pub fn with_limits(store: Arc<dyn ObjectStore>, worker_count: usize, queue_capacity: usize) -> Self {
        Self {
            paginator: Paginator::new(store.clone()),
            store,
            worker_count: worker_count.max(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Copy every object under `source_dir` to the same relative key under `target_dir`
    /// 复制目录及其内容到新位置
    pub async fn copy_directory(&self, bucket: &str, source_dir: &str, target_dir: &str) -> Result<BulkReport> {
        let source = utils::normalize_dir_prefix(source_dir)
            .ok_or_else(|| GatewayError::InvalidInput("source directory must not be empty".to_string()))?;
        let target = utils::normalize_dir_prefix(target_dir)
            .ok_or_else(|| GatewayError::InvalidInput("target directory must not be empty".to_string()))?;
        // copies under the source prefix would be listed again
        if utils::is_within_prefix(&target, &source) {
            return Err(GatewayError::InvalidInput(format!(
                "target directory {} must not be inside source directory {}",
                target, source
            )));
        }

        let tasks = {
            let (source, target) = (source.clone(), target.clone());
            move |key: String| {
                let target_key = utils::rebase_key(&key, &source, &target);
                BulkTask::Copy(CopyTask { source_key: key, target_key })
            }
        };

        let applied = self.run("copy", bucket, &source, tasks).await?;
        tracing::info!("Successfully copied directory from {} to {} ({} objects)", source, target, applied);

        Ok(BulkReport {
            operation: "copy",
            bucket: bucket.to_string(),
            source,
            target: Some(target),
            tasks: applied,
        })
    }

    /// Delete every object under `dir` / 删除目录及其内容
    pub async fn delete_directory(&self, bucket: &str, dir: &str) -> Result<BulkReport> {
        let prefix = utils::normalize_dir_prefix(dir)
            .ok_or_else(|| GatewayError::InvalidInput("directory must not be empty".to_string()))?;

        let applied = self
            .run("delete", bucket, &prefix, |key| BulkTask::Delete(DeleteTask { key }))
            .await?;
        tracing::info!("Successfully deleted directory {} ({} objects)", prefix, applied);

        Ok(BulkReport {
            operation: "delete",
            bucket: bucket.to_string(),
            source: prefix,
            target: None,
            tasks: applied,
        })
    }

    async fn run(
        &self,
        operation: &'static str,
        bucket: &str,
        prefix: &str,
        make_task: impl Fn(String) -> BulkTask,
    ) -> Result<usize> {
        let (tx, rx) = mpsc::channel::<BulkTask>(self.queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let failures: Arc<Mutex<Vec<TaskFailure>>> = Arc::new(Mutex::new(Vec::new()));
        let attempted = Arc::new(AtomicUsize::new(0));

        // 启动工作池
        let mut workers = Vec::with_capacity(self.worker_count);
        for _ in 0..self.worker_count {
            let store = self.store.clone();
            let bucket = bucket.to_string();
            let rx = rx.clone();
            let failures = failures.clone();
            let attempted = attempted.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    // lock is released before the task is applied
                    let next = rx.lock().await.recv().await;
                    let Some(task) = next else { break };

                    attempted.fetch_add(1, Ordering::SeqCst);
                    if let Err(e) = apply(store.as_ref(), &bucket, &task).await {
                        tracing::warn!("Bulk {} task failed: {}", operation, e);
                        failures.lock().push(TaskFailure {
                            key: task.key().to_string(),
                            message: e.to_string(),
                        });
                    }
                }
            }));
        }

        // 列出前缀下的所有对象并创建任务
        let mut keys = self.paginator.list_all_under_prefix(bucket, prefix);
        while let Some(item) = keys.next().await {
            match item {
                Ok(key) => {
                    if tx.send(make_task(key)).await.is_err() {
                        // every worker is gone; remaining keys cannot be applied
                        failures.lock().push(TaskFailure {
                            key: prefix.to_string(),
                            message: "worker pool stopped before the listing finished".to_string(),
                        });
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Bulk {} listing aborted: {}", operation, e);
                    failures.lock().push(TaskFailure {
                        key: prefix.to_string(),
                        message: e.to_string(),
                    });
                    break;
                }
            }
        }
        drop(tx);

        // 等待所有工作完成
        for joined in futures::future::join_all(workers).await {
            if let Err(e) = joined {
                failures.lock().push(TaskFailure {
                    key: prefix.to_string(),
                    message: format!("worker panicked: {}", e),
                });
            }
        }

        let attempted = attempted.load(Ordering::SeqCst);
        let failures = std::mem::take(&mut *failures.lock());
        if failures.is_empty() {
            return Ok(attempted);
        }

        let err = GatewayError::BulkFailed { operation, attempted, failures };
        tracing::error!("{}", err);
        Err(err)
    }
}

async fn apply(store: &dyn ObjectStore, bucket: &str, task: &BulkTask) -> Result<()> {
    match task {
        BulkTask::Copy(copy) => {
            let source = CopySource::new(bucket, &copy.source_key);
            store.copy_object(bucket, &source, &copy.target_key).await?;
            tracing::debug!("Copied {} to {}", copy.source_key, copy.target_key);
        }
        BulkTask::Delete(delete) => {
            store.delete_object(bucket, &delete.key).await?;
            tracing::debug!("Deleted {}", delete.key);
        }
    }
    Ok(())
}
