// src/models/mod.rs

//! Domain models for the watcher.

mod config;
mod subscription;

// Re-export all public types
pub use config::{Config, ExtractConfig, HttpConfig, NotifierConfig, StoreConfig, WatcherConfig};
pub use subscription::{SnapshotKey, Subscription, SubscriptionId};
