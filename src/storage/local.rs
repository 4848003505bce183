//! Local filesystem subscription repository.
//!
//! Subscriptions live in a single JSON array. Every mutation is a
//! read-modify-write of the whole file, serialised by a mutex and written
//! atomically (temp file, then rename) so a crash never leaves a half-written
//! file behind. Records added to the file by another process between cycles
//! are preserved.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::Subscription;
use crate::storage::{SubscriptionRepository, assign_ids, merge_by_id};

/// JSON file backend.
pub struct JsonFileRepository {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file, assigning unique ids to every record.
    async fn read_all(&self) -> Result<Vec<Subscription>> {
        let bytes = tokio::fs::read(&self.path).await?;
        let mut subscriptions: Vec<Subscription> = serde_json::from_slice(&bytes)?;
        assign_ids(&mut subscriptions);
        Ok(subscriptions)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_all(&self, subscriptions: &[Subscription]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(subscriptions)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn describe(&self, error: AppError) -> String {
        format!("{}: {}", self.path.display(), error)
    }
}

#[async_trait]
impl SubscriptionRepository for JsonFileRepository {
    async fn load(&self) -> Result<Vec<Subscription>> {
        let _guard = self.lock.lock().await;
        let subscriptions = self
            .read_all()
            .await
            .map_err(|e| AppError::repository("load", self.describe(e)))?;
        log::debug!(
            "Loaded {} subscriptions from {}",
            subscriptions.len(),
            self.path.display()
        );
        Ok(subscriptions)
    }

    async fn save(&self, subscriptions: &[Subscription]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let result = async {
            let mut records = self.read_all().await?;
            merge_by_id(&mut records, subscriptions);
            self.write_all(&records).await
        }
        .await;
        result.map_err(|e| AppError::repository("save", self.describe(e)))
    }

    async fn remove(&self, subscription: &Subscription) -> Result<()> {
        let _guard = self.lock.lock().await;
        let result = async {
            let mut records = self.read_all().await?;
            records.retain(|r| r.id != subscription.id);
            self.write_all(&records).await
        }
        .await;
        result.map_err(|e| AppError::repository("remove", self.describe(e)))
    }
}
