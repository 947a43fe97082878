// src/shared/mod.rs
//! State shared between the lifecycle controller and the thread pools.

pub(crate) mod queue;
pub(crate) mod stats;

pub use queue::{ByteQueue, PushOutcome};
pub use stats::{EngineStats, StatsSnapshot};
