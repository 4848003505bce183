//! In-process subscription repository.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::Subscription;
use crate::storage::{SubscriptionRepository, assign_ids, merge_by_id};

/// Repository backed by a shared vector. Clones share the same list.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    records: Arc<Mutex<Vec<Subscription>>>,
}

impl MemoryRepository {
    pub fn new(mut records: Vec<Subscription>) -> Self {
        assign_ids(&mut records);
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    /// Current contents.
    pub async fn snapshot(&self) -> Vec<Subscription> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryRepository {
    async fn load(&self) -> Result<Vec<Subscription>> {
        Ok(self.records.lock().await.clone())
    }

    async fn save(&self, subscriptions: &[Subscription]) -> Result<()> {
        merge_by_id(&mut self.records.lock().await, subscriptions);
        Ok(())
    }

    async fn remove(&self, subscription: &Subscription) -> Result<()> {
        self.records
            .lock()
            .await
            .retain(|r| r.id != subscription.id);
        Ok(())
    }
}
