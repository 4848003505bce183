// src/pipeline/cycle.rs

//! The watch cycle: fetch, extract, diff and error accounting for every
//! subscription, followed by evictions, alerts and a final save.
//!
//! Per subscription the cycle is a small state machine:
//!
//! ```text
//! Active(n) --success--> Active(0)
//! Active(n) --hard failure--> Active(n + 1)   if n + 1 <= threshold
//!                         \-> Evicted         otherwise (terminal)
//! Active(n) --non-200--> Active(n)
//! ```
//!
//! Fetches fan out across spawned tasks, one per distinct snapshot key.
//! Tasks only return extracted content; the snapshot store and the
//! subscription list are touched solely by the engine once every result is
//! in, so every subscription is compared against the snapshot as it stood
//! when the cycle began.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::error::{AppError, FetchError, ProbeFailure, Result};
use crate::models::{Config, SnapshotKey, Subscription, SubscriptionId};
use crate::pipeline::SnapshotStore;
use crate::services::{ContentExtractor, Fetcher, Notifier};
use crate::storage::SubscriptionRepository;
use crate::utils::fingerprint;

type Probe = std::result::Result<Vec<u8>, ProbeFailure>;

/// Tunables for a cycle.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// Consecutive hard failures tolerated before eviction
    pub eviction_threshold: u32,
    /// Upper bound on a single fetch
    pub fetch_timeout: Duration,
    /// Maximum fetches in flight
    pub max_concurrent: usize,
}

impl CycleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            eviction_threshold: config.watcher.eviction_threshold,
            fetch_timeout: config.http.timeout(),
            max_concurrent: config.http.max_concurrent,
        }
    }
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// How a successful observation compares with the stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// No snapshot existed; this one becomes the baseline.
    Baseline,
    Unchanged,
    Changed,
}

/// Compare freshly extracted content with the previous snapshot, byte for byte.
pub fn classify(previous: Option<&[u8]>, current: &[u8]) -> Observation {
    match previous {
        None => Observation::Baseline,
        Some(prev) if prev == current => Observation::Unchanged,
        Some(_) => Observation::Changed,
    }
}

/// A subscription whose content changed, with a short description.
#[derive(Debug, Clone)]
pub struct Change {
    pub subscription: Subscription,
    pub summary: String,
}

/// Partitioned outcome of one cycle.
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub changed: Vec<Change>,
    pub evicted: Vec<Subscription>,
    pub baselined: Vec<SubscriptionId>,
    pub unchanged: Vec<SubscriptionId>,
    /// Non-200 responses
    pub soft_failures: Vec<SubscriptionId>,
    /// Hard failures still under the eviction threshold
    pub errored: Vec<SubscriptionId>,
    /// No destination configured
    pub skipped: Vec<SubscriptionId>,
    /// Alerts that could not be delivered
    pub notify_failures: usize,
}

impl CycleResult {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            changed: Vec::new(),
            evicted: Vec::new(),
            baselined: Vec::new(),
            unchanged: Vec::new(),
            soft_failures: Vec::new(),
            errored: Vec::new(),
            skipped: Vec::new(),
            notify_failures: 0,
        }
    }

    pub fn is_changed(&self, id: &SubscriptionId) -> bool {
        self.changed.iter().any(|c| &c.subscription.id == id)
    }

    pub fn is_evicted(&self, id: &SubscriptionId) -> bool {
        self.evicted.iter().any(|s| &s.id == id)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Drives one cycle at a time over the repository's subscriptions.
pub struct WatchCycleEngine {
    repository: Arc<dyn SubscriptionRepository>,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    extractor: Arc<ContentExtractor>,
    snapshots: SnapshotStore,
    settings: CycleSettings,
}

impl WatchCycleEngine {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repository,
            fetcher,
            notifier,
            extractor: Arc::new(ContentExtractor::default()),
            snapshots: SnapshotStore::new(),
            settings: CycleSettings::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: ContentExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn with_settings(mut self, settings: CycleSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Run one full cycle.
    ///
    /// Any error returned here is fatal to the watch loop. Once loading has
    /// succeeded the working set is saved even if a later step failed.
    pub async fn run_cycle(&mut self) -> Result<CycleResult> {
        let mut result = CycleResult::new(Utc::now());

        let mut subscriptions = self
            .repository
            .load()
            .await
            .map_err(|e| repository_error("load", e))?;
        if self.snapshots.is_empty() {
            log::info!(
                "No snapshots yet. This cycle baselines {} subscriptions",
                subscriptions.len()
            );
        } else {
            log::debug!(
                "Cycle started with {} subscriptions, {} snapshots",
                subscriptions.len(),
                self.snapshots.len()
            );
        }

        let outcome = match self.probe_all(&subscriptions, &mut result).await {
            Ok(probes) => {
                self.apply(&mut subscriptions, probes, &mut result);
                let evicted = self.evict(&mut subscriptions, &mut result).await;
                self.notify_changes(&mut result).await;
                evicted
            }
            Err(e) => Err(e),
        };

        let saved = self
            .repository
            .save(&subscriptions)
            .await
            .map_err(|e| repository_error("save", e));

        result.finished_at = Utc::now();
        outcome?;
        saved?;

        log::info!(
            "Cycle finished in {}ms: {} changed, {} unchanged, {} new, {} non-200, {} failing, {} evicted",
            result.duration_ms(),
            result.changed.len(),
            result.unchanged.len(),
            result.baselined.len(),
            result.soft_failures.len(),
            result.errored.len(),
            result.evicted.len()
        );
        Ok(result)
    }

    /// Fetch and extract every distinct snapshot key concurrently.
    async fn probe_all(
        &self,
        subscriptions: &[Subscription],
        result: &mut CycleResult,
    ) -> Result<HashMap<SnapshotKey, Probe>> {
        let mut keys = BTreeSet::new();
        for subscription in subscriptions {
            if subscription.is_actionable() {
                keys.insert(subscription.snapshot_key());
            } else {
                log::warn!(
                    "Subscription {} for {} has no destination. Skipping.",
                    subscription.id,
                    subscription.url
                );
                result.skipped.push(subscription.id.clone());
            }
        }

        let concurrency = self.settings.max_concurrent.max(1);
        let fetch_timeout = self.settings.fetch_timeout;

        let mut probe_stream = stream::iter(keys)
            .map(|key| {
                let fetcher = Arc::clone(&self.fetcher);
                let extractor = Arc::clone(&self.extractor);
                tokio::spawn(async move {
                    let probe = probe(fetcher.as_ref(), &extractor, &key, fetch_timeout).await;
                    (key, probe)
                })
            })
            .buffer_unordered(concurrency);

        let mut probes = HashMap::new();
        while let Some(joined) = probe_stream.next().await {
            let (key, probe) =
                joined.map_err(|e| AppError::orchestration(format!("probe task failed: {e}")))?;
            probes.insert(key, probe);
        }
        Ok(probes)
    }

    /// Classify every subscription, then commit new snapshots.
    fn apply(
        &mut self,
        subscriptions: &mut [Subscription],
        probes: HashMap<SnapshotKey, Probe>,
        result: &mut CycleResult,
    ) {
        for subscription in subscriptions.iter_mut() {
            subscription.changed = false;

            let key = subscription.snapshot_key();
            let Some(probe) = probes.get(&key) else {
                continue;
            };

            match probe {
                Ok(text) => {
                    subscription.consecutive_errors = 0;
                    let previous = self.snapshots.get(&key);
                    match classify(previous, text) {
                        Observation::Baseline => {
                            log::debug!("Baseline established for {}", key);
                            result.baselined.push(subscription.id.clone());
                        }
                        Observation::Unchanged => result.unchanged.push(subscription.id.clone()),
                        Observation::Changed => {
                            subscription.changed = true;
                            let summary = format!(
                                "Content at {} changed (fingerprint {} → {})",
                                key,
                                fingerprint(previous.unwrap_or_default()),
                                fingerprint(text)
                            );
                            log::info!("{} for {}", summary, subscription.destination());
                            result.changed.push(Change {
                                subscription: subscription.clone(),
                                summary,
                            });
                        }
                    }
                }
                Err(failure) if !failure.is_hard() => {
                    log::warn!(
                        "{} at {} for {}. Will skip this time.",
                        failure,
                        subscription.url,
                        subscription.destination()
                    );
                    result.soft_failures.push(subscription.id.clone());
                }
                Err(failure) => {
                    subscription.consecutive_errors += 1;
                    log::warn!(
                        "Failure {} of {} for {}: {}",
                        subscription.consecutive_errors,
                        self.settings.eviction_threshold,
                        subscription.destination(),
                        failure
                    );
                    if subscription.consecutive_errors > self.settings.eviction_threshold {
                        result.evicted.push(subscription.clone());
                    } else {
                        result.errored.push(subscription.id.clone());
                    }
                }
            }
        }

        for (key, probe) in probes {
            if let Ok(content) = probe {
                self.snapshots.put(key, content);
            }
        }
    }

    /// Remove evicted subscriptions from the working set and the repository.
    async fn evict(
        &self,
        subscriptions: &mut Vec<Subscription>,
        result: &mut CycleResult,
    ) -> Result<()> {
        if result.evicted.is_empty() {
            return Ok(());
        }

        let evicted_ids: HashSet<&SubscriptionId> = result.evicted.iter().map(|s| &s.id).collect();
        subscriptions.retain(|s| !evicted_ids.contains(&s.id));

        let mut first_error = None;
        for subscription in &result.evicted {
            log::warn!(
                "Evicting {} ({}) after {} consecutive failures",
                subscription.url,
                subscription.id,
                subscription.consecutive_errors
            );
            if let Err(e) = self.repository.remove(subscription).await {
                log::error!("Failed to remove {}: {}", subscription.id, e);
                if first_error.is_none() {
                    first_error = Some(repository_error("remove", e));
                }
                continue;
            }
            if let Err(e) = self.notifier.notify_eviction(subscription).await {
                log::error!("Eviction alert for {} failed: {}", subscription.id, e);
                result.notify_failures += 1;
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Send change alerts, then one operator alert if any alert failed.
    async fn notify_changes(&self, result: &mut CycleResult) {
        for change in &result.changed {
            if let Err(e) = self
                .notifier
                .notify_change(&change.subscription, &change.summary)
                .await
            {
                log::error!("Change alert for {} failed: {}", change.subscription.id, e);
                result.notify_failures += 1;
            }
        }

        if result.notify_failures > 0 {
            let message = format!(
                "pagewatch: {} subscriber alert(s) could not be delivered this cycle",
                result.notify_failures
            );
            if let Err(e) = self.notifier.notify_operator(&message).await {
                log::error!("Operator alert failed: {}", e);
            }
        }
    }
}

/// Fetch and extract one key under a timeout.
async fn probe(
    fetcher: &dyn Fetcher,
    extractor: &ContentExtractor,
    key: &SnapshotKey,
    limit: Duration,
) -> Probe {
    let response = match tokio::time::timeout(limit, fetcher.fetch(&key.url)).await {
        Ok(response) => response?,
        Err(_) => {
            return Err(FetchError::Timeout {
                url: key.url.clone(),
                timeout: limit,
            }
            .into());
        }
    };

    if !response.is_success() {
        return Err(ProbeFailure::Soft {
            status: response.status,
        });
    }

    Ok(extractor.extract(&response.body, &key.selector)?)
}

fn repository_error(operation: &'static str, error: AppError) -> AppError {
    match error {
        e @ AppError::Repository { .. } => e,
        other => AppError::repository(operation, other),
    }
}
