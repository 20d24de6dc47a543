//! Extraction scheduling, worker orchestration and the world facade.
#![forbid(unsafe_code)]

mod pool;
mod queue;
mod tracker;
mod world;

pub use pool::WorkerPool;
pub use queue::ConcurrentQueue;
pub use tracker::{ExtractionTracker, PendingTile, TileState};
pub use world::{ExtractionStats, WorldError, WorldMgr};
