//! Scripted collaborators for engine and scheduler tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, FetchError, Result};
use crate::models::{Subscription, SubscriptionId};
use crate::services::{FetchResponse, Fetcher, Notifier};
use crate::storage::{MemoryRepository, SubscriptionRepository};

/// One scripted fetch outcome.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(String),
    Status(u16),
    Fail,
    Hang,
    /// The fetch task panics.
    Panic,
}

/// Fetcher that replays scripted replies per URL. The last reply repeats.
#[derive(Default)]
pub struct StubFetcher {
    script: Mutex<HashMap<String, VecDeque<Reply>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch sleeps this long before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn script(self, url: &str, replies: Vec<Reply>) -> Self {
        self.set(url, replies);
        self
    }

    pub fn set(&self, url: &str, replies: Vec<Reply>) {
        self.script
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, url: &str) -> Reply {
        let mut script = self.script.lock().unwrap();
        let queue = script.entry(url.to_string()).or_default();
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(Reply::Fail)
        } else {
            queue.front().cloned().unwrap_or(Reply::Fail)
        }
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.next_reply(url);
        if matches!(reply, Reply::Hang) {
            std::future::pending::<()>().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if matches!(reply, Reply::Panic) {
            panic!("fetcher crashed on {url}");
        }

        match reply {
            Reply::Ok(body) => Ok(FetchResponse::ok(body)),
            Reply::Status(status) => Ok(FetchResponse {
                status,
                body: Vec::new(),
            }),
            Reply::Fail | Reply::Hang | Reply::Panic => {
                Err(FetchError::transport(url, "connection refused"))
            }
        }
    }
}

/// Notifier that records every call and can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub changes: Mutex<Vec<(SubscriptionId, String)>>,
    pub evictions: Mutex<Vec<SubscriptionId>>,
    pub operator: Mutex<Vec<String>>,
    fail_subscribers: bool,
    fail_operator: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_subscribers(mut self) -> Self {
        self.fail_subscribers = true;
        self
    }

    pub fn failing_operator(mut self) -> Self {
        self.fail_operator = true;
        self
    }

    pub fn change_ids(&self) -> Vec<SubscriptionId> {
        self.changes
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn eviction_ids(&self) -> Vec<SubscriptionId> {
        self.evictions.lock().unwrap().clone()
    }

    pub fn operator_messages(&self) -> Vec<String> {
        self.operator.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_change(&self, subscription: &Subscription, summary: &str) -> Result<()> {
        self.changes
            .lock()
            .unwrap()
            .push((subscription.id.clone(), summary.to_string()));
        if self.fail_subscribers {
            return Err(AppError::notify("change alert rejected"));
        }
        Ok(())
    }

    async fn notify_eviction(&self, subscription: &Subscription) -> Result<()> {
        self.evictions.lock().unwrap().push(subscription.id.clone());
        if self.fail_subscribers {
            return Err(AppError::notify("eviction alert rejected"));
        }
        Ok(())
    }

    async fn notify_operator(&self, message: &str) -> Result<()> {
        self.operator.lock().unwrap().push(message.to_string());
        if self.fail_operator {
            return Err(AppError::notify("operator channel down"));
        }
        Ok(())
    }
}

/// Wraps a [`MemoryRepository`], counting calls and injecting failures.
#[derive(Default)]
pub struct CountingRepository {
    pub inner: MemoryRepository,
    pub loads: AtomicUsize,
    pub saves: AtomicUsize,
    pub removed: Mutex<Vec<SubscriptionId>>,
    pub fail_load: bool,
    pub fail_save: bool,
    pub fail_remove: bool,
}

impl CountingRepository {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        Self {
            inner: MemoryRepository::new(subscriptions),
            ..Self::default()
        }
    }

    pub fn failing_load() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn removed(&self) -> Vec<SubscriptionId> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriptionRepository for CountingRepository {
    async fn load(&self) -> Result<Vec<Subscription>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(AppError::repository("load", "store unavailable"));
        }
        self.inner.load().await
    }

    async fn save(&self, subscriptions: &[Subscription]) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_save {
            return Err(AppError::repository("save", "disk full"));
        }
        self.inner.save(subscriptions).await
    }

    async fn remove(&self, subscription: &Subscription) -> Result<()> {
        self.removed.lock().unwrap().push(subscription.id.clone());
        if self.fail_remove {
            return Err(AppError::repository("remove", "store is read-only"));
        }
        self.inner.remove(subscription).await
    }
}

/// Subscription with an id and an email destination.
pub fn subscription(id: &str, url: &str) -> Subscription {
    Subscription::new(url)
        .with_id(id)
        .with_email(format!("{id}@example.com"))
}
