//! Subscription persistence.
//!
//! The cycle engine only sees [`SubscriptionRepository`]. Two backends are
//! provided:
//!
//! - [`JsonFileRepository`]: a JSON array on disk, written atomically
//! - [`MemoryRepository`]: a shared in-process list
//!
//! ```text
//! Subscriptions.json
//! [
//!   { "id": "3f1c…", "url": "https://…", "selector": "#price",
//!     "email": "a@example.com", "consecutive_errors": 0 }
//! ]
//! ```

pub mod local;
pub mod memory;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Subscription, SubscriptionId};

// Re-export for convenience
pub use local::JsonFileRepository;
pub use memory::MemoryRepository;

/// Trait for subscription storage backends.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Load the current subscription set. Every returned subscription has an id.
    async fn load(&self) -> Result<Vec<Subscription>>;

    /// Persist the mutable state of the given subscriptions.
    ///
    /// Records not present in `subscriptions` are left untouched.
    async fn save(&self, subscriptions: &[Subscription]) -> Result<()>;

    /// Delete a subscription permanently.
    async fn remove(&self, subscription: &Subscription) -> Result<()>;
}

/// Give every record an id, suffixing repeats so ids are unique in the set.
///
/// Suffixes follow record order, so the same file always yields the same ids.
fn assign_ids(records: &mut [Subscription]) {
    let mut seen: HashSet<SubscriptionId> = HashSet::with_capacity(records.len());
    for record in records.iter_mut() {
        record.ensure_id();
        if seen.contains(&record.id) {
            let base = record.id.clone();
            let mut n = 2;
            let unique = loop {
                let candidate = SubscriptionId::new(format!("{base}-{n}"));
                if !seen.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            };
            log::warn!(
                "Duplicate subscription id {} for {}, using {}",
                base,
                record.url,
                unique
            );
            record.id = unique;
        }
        seen.insert(record.id.clone());
    }
}

/// Copy persisted fields from `updates` onto matching records by id.
fn merge_by_id(records: &mut [Subscription], updates: &[Subscription]) {
    for record in records.iter_mut() {
        if let Some(update) = updates.iter().find(|u| u.id == record.id) {
            record.consecutive_errors = update.consecutive_errors;
        }
    }
}
