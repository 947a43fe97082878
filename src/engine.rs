// src/engine.rs
//! Engine lifecycle: init, start, stop, destroy.
//!
//! ```text
//! init ──> Initialized ──start──> Running ──stop──> Stopped ──start──> Running ...
//!               │                    │                 │
//!               └──────destroy───────┴─────destroy─────┴──> Destroyed
//! ```
//!
//! The [`Engine`] value owns every resource: the ring and its lock, the bound
//! socket, the per-listener readiness registrations and the thread handles.
//! Threads only hold `Arc`s to the shared queue and counters, and are always
//! joined before the engine releases anything. Dropping an engine destroys
//! it.

use crate::config::EngineConfig;
use crate::error::{InitError, StartError, StateError, ThreadRole};
use crate::listener::{self, pool::ListenerContext, socket::ListenerSlot};
use crate::shared::{ByteQueue, EngineStats, StatsSnapshot};
use crate::worker::{self, DataCallback};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Lifecycle state of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Resources acquired, no threads
    Initialized,
    /// Listener and worker threads running
    Running,
    /// Threads joined; may be started again
    Stopped,
    /// Resources released; terminal
    Destroyed,
}

/// Handle to one UDP ingestion engine.
///
/// # Example
///
/// ```no_run
/// use udpring::prelude::*;
///
/// let mut engine = Engine::init(EngineConfig::default())?;
/// engine.set_data_callback(|bytes: &[u8]| {
///     println!("received {} bytes", bytes.len());
/// })?;
/// engine.start()?;
/// std::thread::sleep(std::time::Duration::from_secs(30));
/// engine.stop();
/// engine.destroy();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Engine {
    config: EngineConfig,
    state: EngineState,
    local_addr: SocketAddr,
    queue: Arc<ByteQueue>,
    stats: Arc<EngineStats>,
    socket: Option<UdpSocket>,
    /// Readiness registrations, indexed by listener; `None` while a thread owns one
    slots: Vec<Option<ListenerSlot>>,
    listeners: Vec<JoinHandle<Option<ListenerSlot>>>,
    workers: Vec<JoinHandle<()>>,
    callback: Option<DataCallback>,
    /// Spawn attempt of the next `start` that fails, counting listeners first
    #[cfg(test)]
    fail_spawn_at: Option<usize>,
}

impl Engine {
    /// Acquires every resource the engine needs, without starting threads.
    ///
    /// Invalid configuration values are replaced by their defaults. Each call
    /// creates an independent engine; there is no process-wide state.
    ///
    /// # Errors
    ///
    /// Returns [`InitError`] if the ring cannot be allocated or the socket
    /// cannot be created, bound or registered. Anything acquired before the
    /// failure is released before this returns.
    pub fn init(config: EngineConfig) -> Result<Self, InitError> {
        let config = config.sanitized();

        let queue = Arc::new(ByteQueue::new(config.buffer_size)?);
        let socket = listener::socket::bind_shared(config.bind_addr())?;
        let local_addr = socket.local_addr().map_err(InitError::Socket)?;

        let slot_count = listener::required_slots(config.listen_strategy, config.listen_threads);
        let mut slots = table(ThreadRole::Listener, slot_count)?;
        let listeners = table(ThreadRole::Listener, config.listen_threads)?;
        let workers = table(ThreadRole::Worker, config.work_threads)?;
        for index in 0..slot_count {
            let slot = ListenerSlot::open(&socket, index)
                .map_err(|source| InitError::Registration { index, source })?;
            slots.push(Some(slot));
        }

        log::info!(
            "[UDP] engine initialized on {} (listeners={} workers={} buffer={} strategy={:?})",
            local_addr,
            config.listen_threads,
            config.work_threads,
            config.buffer_size,
            config.listen_strategy
        );

        Ok(Self {
            listeners,
            workers,
            config,
            state: EngineState::Initialized,
            local_addr,
            queue,
            stats: Arc::new(EngineStats::default()),
            socket: Some(socket),
            slots,
            callback: None,
            #[cfg(test)]
            fail_spawn_at: None,
        })
    }

    /// Loads configuration from a JSON file (defaults on any problem) and
    /// initializes an engine with it.
    pub fn init_from_file<P: AsRef<Path>>(path: P) -> Result<Self, InitError> {
        Self::init(EngineConfig::load(path))
    }

    /// Registers the function that receives drained bytes, replacing any
    /// earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Running`] while the engine runs (workers capture
    /// the callback at start) and [`StateError::Destroyed`] after destroy.
    pub fn set_data_callback<F>(&mut self, callback: F) -> Result<(), StateError>
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        match self.state {
            EngineState::Running => Err(StateError::Running),
            EngineState::Destroyed => Err(StateError::Destroyed),
            EngineState::Initialized | EngineState::Stopped => {
                self.callback = Some(Arc::new(callback));
                Ok(())
            }
        }
    }

    /// Spawns the listener and worker threads.
    ///
    /// Calling it while running logs a warning and returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// On the first thread that fails to spawn, the remaining spawns are
    /// abandoned, every thread already started is stopped and joined, and
    /// [`StartError::Spawn`] is returned with the engine not running.
    pub fn start(&mut self) -> Result<(), StartError> {
        match self.state {
            EngineState::Destroyed => return Err(StartError::Destroyed),
            EngineState::Running => {
                log::warn!("[UDP] engine already running");
                return Ok(());
            }
            EngineState::Initialized | EngineState::Stopped => {}
        }

        self.rebuild_slots()?;
        self.queue.open();

        let ctx = ListenerContext {
            queue: Arc::clone(&self.queue),
            stats: Arc::clone(&self.stats),
        };
        let tasks = listener::plan(
            self.config.listen_strategy,
            self.config.listen_threads,
            &mut self.slots,
        );
        let mut attempt = 0;
        for task in tasks {
            let index = task.index();
            let ctx = ctx.clone();
            let spawned = self.spawn(attempt, format!("udpring-listen-{index}"), move || {
                task.run(ctx)
            });
            attempt += 1;
            match spawned {
                Ok(handle) => self.listeners.push(handle),
                Err(source) => return Err(self.abort_start(ThreadRole::Listener, index, source)),
            }
        }

        for index in 0..self.config.work_threads {
            let queue = Arc::clone(&self.queue);
            let stats = Arc::clone(&self.stats);
            let callback = self.callback.clone();
            let spawned = self.spawn(attempt, format!("udpring-work-{index}"), move || {
                worker::run(index, queue, stats, callback)
            });
            attempt += 1;
            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(source) => return Err(self.abort_start(ThreadRole::Worker, index, source)),
            }
        }

        self.state = EngineState::Running;
        log::info!(
            "[UDP] engine started on {} ({} listeners, {} workers)",
            self.local_addr,
            self.listeners.len(),
            self.workers.len()
        );
        Ok(())
    }

    /// Clears the running flag, wakes every worker and joins all threads.
    ///
    /// Blocks for up to one listener poll interval. Calling it when not
    /// running logs a warning and does nothing.
    pub fn stop(&mut self) {
        if self.state != EngineState::Running {
            log::warn!("[UDP] engine not running");
            return;
        }

        self.queue.close();
        self.join_all();
        self.state = EngineState::Stopped;
        log::info!("[UDP] engine stopped");
    }

    /// Stops the engine if needed and releases every resource.
    ///
    /// Release order: readiness registrations, socket, ring storage (zeroed),
    /// thread-handle tables. Calling it again is a no-op.
    pub fn destroy(&mut self) {
        if self.state == EngineState::Destroyed {
            return;
        }
        if self.state == EngineState::Running {
            self.stop();
        }

        self.slots = Vec::new();
        self.socket = None;
        self.queue.release();
        self.callback = None;
        self.listeners = Vec::new();
        self.workers = Vec::new();

        self.state = EngineState::Destroyed;
        log::info!("[UDP] engine on {} destroyed", self.local_addr);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Returns `true` between a successful `start` and the next `stop`.
    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    /// Address the socket is bound to (with the OS-chosen port if 0 was
    /// configured).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Effective configuration after defaults were applied.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Listener threads spawned by the current run.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Worker threads spawned by the current run.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Bytes waiting in the ring.
    pub fn occupancy(&self) -> usize {
        self.queue.occupancy()
    }

    /// Ring capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Snapshot of the runtime counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Re-registers any listener slot lost to a thread that panicked or was
    /// never spawned.
    fn rebuild_slots(&mut self) -> Result<(), StartError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(StartError::Destroyed);
        };
        for (index, entry) in self.slots.iter_mut().enumerate() {
            if entry.is_none() {
                log::warn!("[UDP] rebuilding listener slot {}", index);
                let slot = ListenerSlot::open(socket, index)
                    .map_err(|source| StartError::Registration { index, source })?;
                *entry = Some(slot);
            }
        }
        Ok(())
    }

    fn spawn<F, T>(&self, attempt: usize, name: String, f: F) -> io::Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        #[cfg(test)]
        if self.fail_spawn_at == Some(attempt) {
            return Err(io::Error::other("spawn refused"));
        }
        log::trace!("[UDP] spawning {} (attempt {})", name, attempt);
        thread::Builder::new().name(name).spawn(f)
    }

    fn abort_start(&mut self, role: ThreadRole, index: usize, source: io::Error) -> StartError {
        log::error!("[UDP] failed to create {} thread {}: {}", role, index, source);
        self.queue.close();
        self.join_all();
        StartError::Spawn {
            role,
            index,
            source,
        }
    }

    /// Joins every thread and takes back the slots listeners return.
    fn join_all(&mut self) {
        for handle in self.listeners.drain(..) {
            let name = handle.thread().name().unwrap_or("listener").to_string();
            match handle.join() {
                Ok(Some(slot)) => {
                    if let Some(entry) = self.slots.get_mut(slot.index) {
                        *entry = Some(slot);
                    }
                }
                Ok(None) => {}
                Err(_) => log::error!("[UDP] {} panicked, its slot will be rebuilt", name),
            }
        }
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                log::error!("[UDP] {} panicked", name);
            }
        }
    }
}

/// Empty table with room for `count` entries, or [`InitError::Table`].
fn table<T>(role: ThreadRole, count: usize) -> Result<Vec<T>, InitError> {
    let mut entries = Vec::new();
    entries
        .try_reserve_exact(count)
        .map_err(|_| InitError::Table { role, count })?;
    Ok(entries)
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("local_addr", &self.local_addr)
            .field("listeners", &self.listeners.len())
            .field("workers", &self.workers.len())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
