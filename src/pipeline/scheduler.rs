// src/pipeline/scheduler.rs

//! Fixed-interval driver for the watch cycle.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::pipeline::WatchCycleEngine;
use crate::services::operator_message;

/// Runs the engine once immediately and then once per interval.
///
/// Cycles run inline in the loop, so a slow cycle delays the next tick
/// instead of overlapping with it.
pub struct Scheduler {
    engine: WatchCycleEngine,
    interval: Duration,
}

impl Scheduler {
    pub fn new(engine: WatchCycleEngine, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Loop until `shutdown` is cancelled or a cycle fails fatally.
    ///
    /// Cancellation is observed between cycles. Returns the number of
    /// completed cycles.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<u64> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::info!(
            "Watch loop starting (interval {}ms)",
            self.interval.as_millis()
        );

        let mut completed = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    log::info!("Shutdown requested, stopping after {} cycles", completed);
                    break;
                }
                _ = ticker.tick() => {}
            }

            match self.engine.run_cycle().await {
                Ok(_) => completed += 1,
                Err(e) => {
                    log::error!("Watch cycle failed. Watcher will stop: {}", e);
                    self.alert_operator(&e).await;
                    return Err(e);
                }
            }
        }

        Ok(completed)
    }

    async fn alert_operator(&self, error: &AppError) {
        let notifier = self.engine.notifier();
        if let Err(e) = notifier.notify_operator(&operator_message(error)).await {
            // No channel left to escalate to.
            log::error!("Operator alert failed: {}", e);
        }
    }
}
