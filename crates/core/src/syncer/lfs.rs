//! LFS sync worker: transfers large-file objects for one mirror task.
//!
//! The worker resolves download URLs through the upstream's git-lfs batch
//! API, then streams each object into the local object store, verifying
//! the sha256 oid. Already-present verified objects are skipped, so an
//! interrupted sync resumes where it left off.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::metrics;
use crate::task::{MirrorTask, MirrorTaskEvent, MirrorTaskStatus, MirrorTaskStore};

use super::config::SyncerConfig;
use super::types::{
    LfsBatchObject, LfsBatchRef, LfsBatchRequest, LfsBatchResponse, LfsPointer, LfsTaskPayload,
};
use super::{SlotId, SyncError, SyncWorker, SyncWorkerFactory};

const LFS_MEDIA_TYPE: &str = "application/vnd.git-lfs+json";
const LFS_USER_AGENT: &str = "git-lfs/3.5.1";

/// Concrete [`SyncWorker`] backed by HTTP transfers.
pub struct LfsSyncWorker {
    id: SlotId,
    config: SyncerConfig,
    task_store: Arc<dyn MirrorTaskStore>,
    http: reqwest::Client,
}

impl LfsSyncWorker {
    pub fn new(
        id: SlotId,
        config: SyncerConfig,
        task_store: Arc<dyn MirrorTaskStore>,
    ) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(LFS_USER_AGENT)
            .build()
            .map_err(|e| SyncError::WorkerCreation(e.to_string()))?;

        Ok(Self {
            id,
            config,
            task_store,
            http,
        })
    }

    /// Resolve download URLs for `pointers` via the batch API.
    async fn fetch_download_urls(
        &self,
        source_url: &str,
        branch: Option<&str>,
        pointers: &[LfsPointer],
    ) -> Result<Vec<LfsPointer>, SyncError> {
        let batch_url = if source_url.ends_with(".git") {
            format!("{}/info/lfs/objects/batch", source_url)
        } else {
            format!("{}.git/info/lfs/objects/batch", source_url)
        };

        let request = LfsBatchRequest {
            operation: "download".to_string(),
            objects: pointers
                .iter()
                .map(|p| LfsBatchObject {
                    oid: p.oid.clone(),
                    size: p.size,
                })
                .collect(),
            transfers: vec!["lfs-standalone-file".to_string(), "basic".to_string()],
            hash_algo: "sha256".to_string(),
            reference: branch.map(|b| LfsBatchRef {
                name: format!("refs/heads/{}", b),
            }),
        };

        let response = self
            .http
            .post(&batch_url)
            .header("Accept", LFS_MEDIA_TYPE)
            .header("Content-Type", LFS_MEDIA_TYPE)
            .timeout(Duration::from_secs(self.config.batch_timeout_secs))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::Batch(format!(
                "unexpected status {} from {}",
                response.status(),
                batch_url
            )));
        }

        let batch: LfsBatchResponse = response.json().await?;
        if batch.objects.is_empty() {
            return Err(SyncError::Batch("no objects in batch response".to_string()));
        }

        let mut resolved = Vec::with_capacity(batch.objects.len());
        for object in batch.objects {
            if let Some(err) = object.error {
                return Err(SyncError::Batch(format!(
                    "object {}: {} ({})",
                    object.oid, err.message, err.code
                )));
            }
            let href = object
                .actions
                .and_then(|a| a.download)
                .map(|d| d.href)
                .ok_or_else(|| {
                    SyncError::Batch(format!("object {} has no download action", object.oid))
                })?;
            resolved.push(LfsPointer {
                oid: object.oid,
                size: object.size,
                download_url: Some(href),
            });
        }
        Ok(resolved)
    }

    /// Final path of an object inside the store, git-lfs fan-out layout.
    fn object_path(&self, oid: &str) -> PathBuf {
        if oid.len() >= 4 {
            self.config.objects_dir.join(&oid[..2]).join(&oid[2..4]).join(oid)
        } else {
            self.config.objects_dir.join(oid)
        }
    }

    /// Check whether a previously synced object is present and intact.
    async fn object_verified(&self, pointer: &LfsPointer) -> bool {
        let path = self.object_path(&pointer.oid);
        let Ok(meta) = tokio::fs::metadata(&path).await else {
            return false;
        };
        if meta.len() != pointer.size {
            return false;
        }
        match Self::hash_file(&path).await {
            Ok(digest) => digest == pointer.oid,
            Err(_) => false,
        }
    }

    async fn hash_file(path: &std::path::Path) -> Result<String, SyncError> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Download one object to a temp file, verify it, move it into place.
    async fn download_object(
        &self,
        pointer: &LfsPointer,
        cancel: &mut broadcast::Receiver<()>,
    ) -> Result<(), SyncError> {
        let url = pointer
            .download_url
            .as_deref()
            .ok_or_else(|| SyncError::Batch(format!("object {} has no url", pointer.oid)))?;

        let final_path = self.object_path(&pointer.oid);
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = final_path.with_extension("part");

        let response = self.http.get(url).header("Accept", LFS_MEDIA_TYPE).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::Batch(format!(
                "download of {} returned status {}",
                pointer.oid,
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        let mut hasher = Sha256::new();
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();

        loop {
            tokio::select! {
                biased;
                _ = cancel.recv() => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&tmp_path).await;
                    return Err(SyncError::Cancelled);
                }
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        hasher.update(&bytes);
                        written += bytes.len() as u64;
                        file.write_all(&bytes).await?;
                    }
                    Some(Err(e)) => {
                        drop(file);
                        let _ = tokio::fs::remove_file(&tmp_path).await;
                        return Err(SyncError::Http(e));
                    }
                    None => break,
                }
            }
        }
        file.flush().await?;
        drop(file);

        if written != pointer.size {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(SyncError::Integrity {
                oid: pointer.oid.clone(),
                reason: format!("size mismatch: expected {}, got {}", pointer.size, written),
            });
        }
        let digest = format!("{:x}", hasher.finalize());
        if digest != pointer.oid {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(SyncError::Integrity {
                oid: pointer.oid.clone(),
                reason: format!("sha256 mismatch: got {}", digest),
            });
        }

        tokio::fs::rename(&tmp_path, &final_path).await?;
        Ok(())
    }

    /// Transfer every pointer of the task, updating progress as we go.
    async fn sync_objects(
        &self,
        task: &mut MirrorTask,
        cancel: &mut broadcast::Receiver<()>,
    ) -> Result<(), SyncError> {
        let payload = LfsTaskPayload::parse(task.payload.as_deref())?;
        if payload.pointers.is_empty() {
            info!(
                slot_id = self.id,
                mirror_id = task.mirror_id,
                repo_path = %task.repo_path,
                "no lfs objects to sync"
            );
            return Ok(());
        }

        let pointers = self
            .fetch_download_urls(&task.source_url, payload.branch.as_deref(), &payload.pointers)
            .await?;

        let total = pointers.len();
        let mut synced = 0usize;
        for pointer in &pointers {
            if cancel.try_recv().is_ok() {
                return Err(SyncError::Cancelled);
            }

            if self.object_verified(pointer).await {
                debug!(slot_id = self.id, oid = %pointer.oid, "object already present, skipping");
            } else {
                self.download_object(pointer, cancel).await?;
            }

            synced += 1;
            task.progress = ((synced * 100 + total - 1) / total) as i32;
            self.task_store.update(task).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SyncWorker for LfsSyncWorker {
    fn slot_id(&self) -> SlotId {
        self.id
    }

    async fn run(&self, mut task: MirrorTask, mut cancel: broadcast::Receiver<()>) {
        info!(
            slot_id = self.id,
            task_id = task.id,
            mirror_id = task.mirror_id,
            repo_path = %task.repo_path,
            "starting lfs sync"
        );
        let timer = metrics::SYNC_DURATION.start_timer();
        let result = self.sync_objects(&mut task, &mut cancel).await;
        timer.observe_duration();

        let (event, outcome) = match &result {
            Ok(()) => {
                task.progress = 100;
                task.error_message = None;
                (MirrorTaskEvent::Success, "success")
            }
            Err(SyncError::Cancelled) => {
                info!(slot_id = self.id, task_id = task.id, "lfs sync cancelled");
                (MirrorTaskEvent::Cancel, "cancelled")
            }
            Err(e) => {
                error!(
                    slot_id = self.id,
                    task_id = task.id,
                    mirror_id = task.mirror_id,
                    error = %e,
                    "lfs sync failed"
                );
                task.error_message = Some(e.to_string());
                (MirrorTaskEvent::Fail, "failed")
            }
        };
        metrics::SYNC_RESULTS.with_label_values(&[outcome]).inc();

        match task.status.apply(event) {
            Some(next) => task.status = next,
            None => {
                warn!(
                    slot_id = self.id,
                    task_id = task.id,
                    status = %task.status,
                    ?event,
                    "status does not allow sync outcome, marking failed"
                );
                task.error_message =
                    Some(format!("illegal outcome {:?} from status {}", event, task.status));
                task.status = MirrorTaskStatus::LfsSyncFailed;
            }
        }

        if let Err(e) = self.task_store.update(&task).await {
            error!(
                slot_id = self.id,
                task_id = task.id,
                error = %e,
                "failed to persist sync outcome"
            );
        }
    }
}

/// Factory producing [`LfsSyncWorker`] instances.
pub struct LfsSyncWorkerFactory {
    config: SyncerConfig,
    task_store: Arc<dyn MirrorTaskStore>,
}

impl LfsSyncWorkerFactory {
    pub fn new(config: SyncerConfig, task_store: Arc<dyn MirrorTaskStore>) -> Self {
        Self { config, task_store }
    }
}

#[async_trait]
impl SyncWorkerFactory for LfsSyncWorkerFactory {
    async fn create(&self, slot_id: SlotId) -> Result<Arc<dyn SyncWorker>, SyncError> {
        let worker = LfsSyncWorker::new(
            slot_id,
            self.config.clone(),
            Arc::clone(&self.task_store),
        )?;
        Ok(Arc::new(worker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::SqliteMirrorTaskStore;
    use tempfile::TempDir;

    fn test_worker(dir: &TempDir) -> LfsSyncWorker {
        let store = Arc::new(SqliteMirrorTaskStore::in_memory().unwrap());
        let config = SyncerConfig {
            objects_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        LfsSyncWorker::new(1, config, store).unwrap()
    }

    #[test]
    fn test_object_path_fan_out() {
        let dir = TempDir::new().unwrap();
        let worker = test_worker(&dir);
        let path = worker.object_path("abcdef123456");
        assert!(path.ends_with("ab/cd/abcdef123456"));
    }

    #[tokio::test]
    async fn test_object_verified_checks_size_and_digest() {
        let dir = TempDir::new().unwrap();
        let worker = test_worker(&dir);

        let content = b"hello lfs";
        let oid = format!("{:x}", Sha256::digest(content));
        let path = worker.object_path(&oid);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, content).await.unwrap();

        let good = LfsPointer {
            oid: oid.clone(),
            size: content.len() as u64,
            download_url: None,
        };
        assert!(worker.object_verified(&good).await);

        let wrong_size = LfsPointer {
            oid,
            size: 1,
            download_url: None,
        };
        assert!(!worker.object_verified(&wrong_size).await);

        let missing = LfsPointer {
            oid: "00".repeat(32),
            size: 4,
            download_url: None,
        };
        assert!(!worker.object_verified(&missing).await);
    }

    #[tokio::test]
    async fn test_factory_produces_worker_for_slot() {
        let store: Arc<dyn MirrorTaskStore> = Arc::new(SqliteMirrorTaskStore::in_memory().unwrap());
        let factory = LfsSyncWorkerFactory::new(SyncerConfig::default(), store);
        let worker = factory.create(3).await.unwrap();
        assert_eq!(worker.slot_id(), 3);
    }
}
