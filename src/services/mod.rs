//! Service layer for the watcher.
//!
//! This module contains the collaborators the cycle engine calls:
//! - Page fetching (`Fetcher`, `HttpFetcher`)
//! - Content extraction (`ContentExtractor`)
//! - Alert delivery (`Notifier`, `LogNotifier`, `WebhookNotifier`)

mod extractor;
mod fetcher;
mod notifier;

pub use extractor::ContentExtractor;
pub use fetcher::{FetchResponse, Fetcher, HttpFetcher};
pub use notifier::{
    LogNotifier, Notifier, WebhookNotifier, change_message, eviction_message, operator_message,
};
