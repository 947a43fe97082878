// src/lib.rs
//! # UDP Ingestion Engine
//!
//! An embeddable engine that binds one UDP socket, fans inbound datagrams
//! across a pool of listener threads into a single bounded byte ring, and
//! drains that ring from a pool of worker threads that call a user callback.
//!
//! ```text
//! network -> listener threads -> RingBuffer (one lock + condvar) -> worker threads -> callback
//! ```
//!
//! Features:
//! - Explicit [`Engine`] handle with init/start/stop/destroy lifecycle; several
//!   engines can live in one process
//! - Listener threads share one socket (address/port reuse), or one receiver
//!   hands datagrams to the others ([`ListenStrategy`])
//! - Drop-on-overflow ring: a full buffer never blocks a listener
//! - Callbacks run outside the lock; a panicking callback cannot take a worker down
//! - Ring storage is zeroed with `zeroize` when released
//! - JSON configuration with per-field fall-back to defaults
//!
//! # Datagram boundaries are not preserved
//!
//! The shared buffer is a byte pipe. Datagrams are concatenated as they are
//! written, and workers read whatever bytes are present (up to 64 KiB). Under
//! concurrent traffic a callback may receive several datagrams merged into one
//! span, or one datagram split across two spans on different workers.
//! Nothing orders datagrams across listener threads or callback invocations
//! across workers. Payloads that need framing must carry their own.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod circular;
pub mod config;
pub mod engine;
pub mod error;
pub mod listener;
pub mod shared;
pub mod worker;

// Re-export main types
pub use circular::RingBuffer;
pub use config::{EngineConfig, ListenStrategy};
pub use engine::{Engine, EngineState};
pub use error::{ConfigError, InitError, ResultExt, StartError, StateError, ThreadRole};
pub use shared::{ByteQueue, EngineStats, PushOutcome, StatsSnapshot};
pub use worker::DataCallback;

/// Commonly used imports.
pub mod prelude {
    pub use crate::circular::RingBuffer;
    pub use crate::config::{EngineConfig, ListenStrategy};
    pub use crate::engine::{Engine, EngineState};
    pub use crate::error::{ConfigError, InitError, ResultExt, StartError, StateError};
    pub use crate::shared::StatsSnapshot;
    pub use crate::worker::DataCallback;
}
