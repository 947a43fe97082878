// src/listener/mod.rs
//! Listener pool: threads that move datagrams from the socket into the ring.
//!
//! How the threads share the socket is chosen by [`ListenStrategy`]. Either
//! way the engine sees `listen_threads` listener threads and the same
//! start/stop contract.

pub(crate) mod pool;
pub(crate) mod socket;

pub use pool::{HANDOFF_DEPTH, MAX_DATAGRAM_SIZE, POLL_TIMEOUT};

use crate::config::ListenStrategy;
use crossbeam::channel::{self, Receiver};
use pool::{ListenerContext, Sink};
use socket::ListenerSlot;

/// Number of socket registrations a strategy needs.
pub(crate) fn required_slots(strategy: ListenStrategy, listen_threads: usize) -> usize {
    match strategy {
        ListenStrategy::SharedSocket => listen_threads,
        ListenStrategy::SingleReceiver => 1,
    }
}

/// Work assigned to one listener thread.
pub(crate) enum ListenerTask {
    /// Poll the socket with this slot
    Receive { slot: ListenerSlot, sink: Sink },
    /// Drain the hand-off channel into the ring
    Distribute {
        index: usize,
        rx: Receiver<Vec<u8>>,
    },
}

impl ListenerTask {
    /// Listener index this task runs as.
    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Receive { slot, .. } => slot.index,
            Self::Distribute { index, .. } => *index,
        }
    }

    /// Runs the task to completion, handing back the slot it polled, if any.
    pub(crate) fn run(self, ctx: ListenerContext) -> Option<ListenerSlot> {
        match self {
            Self::Receive { slot, sink } => Some(pool::receive_loop(slot, ctx, sink)),
            Self::Distribute { index, rx } => {
                pool::distribute_loop(index, rx, ctx);
                None
            }
        }
    }
}

/// Builds one task per listener thread, taking the needed slots out of
/// `slots`. Every slot must be present.
pub(crate) fn plan(
    strategy: ListenStrategy,
    listen_threads: usize,
    slots: &mut [Option<ListenerSlot>],
) -> Vec<ListenerTask> {
    match strategy {
        ListenStrategy::SharedSocket => slots
            .iter_mut()
            .take(listen_threads)
            .filter_map(Option::take)
            .map(|slot| ListenerTask::Receive {
                slot,
                sink: Sink::Direct,
            })
            .collect(),
        ListenStrategy::SingleReceiver => {
            let Some(slot) = slots.first_mut().and_then(Option::take) else {
                return Vec::new();
            };
            if listen_threads == 1 {
                return vec![ListenerTask::Receive {
                    slot,
                    sink: Sink::Direct,
                }];
            }
            let (tx, rx) = channel::bounded(HANDOFF_DEPTH);
            let mut tasks = Vec::with_capacity(listen_threads);
            tasks.push(ListenerTask::Receive {
                slot,
                sink: Sink::Forward {
                    tx,
                    backlog: rx.clone(),
                },
            });
            for index in 1..listen_threads {
                tasks.push(ListenerTask::Distribute {
                    index,
                    rx: rx.clone(),
                });
            }
            tasks
        }
    }
}
