//! The watch loop.
//!
//! - `SnapshotStore`: last observed text per snapshot key
//! - `WatchCycleEngine`: one fetch/extract/diff/notify pass
//! - `Scheduler`: drives the engine on a fixed interval

pub mod cycle;
pub mod scheduler;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

pub use cycle::{Change, CycleResult, CycleSettings, Observation, WatchCycleEngine, classify};
pub use scheduler::Scheduler;
pub use snapshot::SnapshotStore;
