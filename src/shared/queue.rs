// src/shared/queue.rs
//! The engine's shared byte queue.
//!
//! One [`parking_lot::Mutex`] guards both the [`RingBuffer`] and the running
//! flag, and one [`parking_lot::Condvar`] wakes workers. This is the only
//! state written from several threads at once.
//!
//! # Locking discipline
//!
//! The lock is held for exactly one ring operation or one condition wait.
//! Socket reads and callbacks always happen outside it.
//!
//! # Byte-pipe semantics
//!
//! The queue stores bytes, not datagrams. Two datagrams pushed back to back
//! may be popped as one merged span, and one large datagram may be popped in
//! several pieces. Ordering between pushes from different threads is whatever
//! order they win the lock in.

use crate::circular::RingBuffer;
use crate::error::InitError;
use parking_lot::{Condvar, Mutex};

struct QueueState {
    ring: RingBuffer,
    running: bool,
}

/// Outcome of a [`ByteQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    /// Bytes stored in the ring
    pub accepted: usize,
    /// Bytes discarded because the ring was full
    pub dropped: usize,
    /// Running flag observed while the lock was held
    pub running: bool,
}

impl PushOutcome {
    /// Returns `true` if part of the push was discarded.
    #[inline]
    pub fn overflowed(&self) -> bool {
        self.dropped > 0
    }
}

/// Bounded byte queue with drop-on-full push and cancellable blocking pop.
pub struct ByteQueue {
    state: Mutex<QueueState>,
    readable: Condvar,
    capacity: usize,
}

impl ByteQueue {
    /// Creates a stopped queue backed by a ring of `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self, InitError> {
        Ok(Self {
            state: Mutex::new(QueueState {
                ring: RingBuffer::with_capacity(capacity)?,
                running: false,
            }),
            readable: Condvar::new(),
            capacity,
        })
    }

    /// Ring capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current occupancy in bytes.
    pub fn occupancy(&self) -> usize {
        self.state.lock().ring.used()
    }

    /// Reads the running flag under the lock.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Sets the running flag. Returns the previous value.
    pub(crate) fn open(&self) -> bool {
        let mut state = self.state.lock();
        std::mem::replace(&mut state.running, true)
    }

    /// Clears the running flag and wakes every blocked popper.
    ///
    /// Returns the previous value.
    pub(crate) fn close(&self) -> bool {
        let was_running = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.running, false)
        };
        self.readable.notify_all();
        was_running
    }

    /// Stores as much of `bytes` as fits and wakes waiting workers.
    ///
    /// Never blocks on space; the unaccepted tail is dropped.
    pub fn push(&self, bytes: &[u8]) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock();
            let accepted = state.ring.write(bytes);
            PushOutcome {
                accepted,
                dropped: bytes.len() - accepted,
                running: state.running,
            }
        };
        if outcome.accepted > 0 {
            self.readable.notify_all();
        }
        outcome
    }

    /// Blocks until bytes are available or the queue is closed.
    ///
    /// Returns `Some(n)` with `n > 0` bytes copied into `out`, or `None` once
    /// the running flag is cleared. Bytes still stored at that point stay in
    /// the ring.
    pub fn pop(&self, out: &mut [u8]) -> Option<usize> {
        let mut state = self.state.lock();
        while state.running && state.ring.is_empty() {
            self.readable.wait(&mut state);
        }
        if !state.running {
            return None;
        }
        Some(state.ring.read(out))
    }

    /// Non-blocking pop, regardless of the running flag.
    pub fn try_pop(&self, out: &mut [u8]) -> usize {
        self.state.lock().ring.read(out)
    }

    /// Zeroes and frees the ring storage.
    pub(crate) fn release(&self) {
        self.state.lock().ring.release();
    }

    /// Returns `true` once the storage has been released.
    pub fn is_released(&self) -> bool {
        self.state.lock().ring.is_released()
    }
}

impl std::fmt::Debug for ByteQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ByteQueue")
            .field("ring", &state.ring)
            .field("running", &state.running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_push_overflow() {
        let queue = ByteQueue::new(16).unwrap();
        let outcome = queue.push(&[7u8; 20]);

        assert_eq!(outcome.accepted, 16);
        assert_eq!(outcome.dropped, 4);
        assert!(outcome.overflowed());
        assert_eq!(queue.occupancy(), 16);
    }

    #[test]
    fn test_pop_returns_none_when_stopped() {
        let queue = ByteQueue::new(64).unwrap();
        queue.push(b"left behind");

        let mut out = [0u8; 64];
        assert_eq!(queue.pop(&mut out), None);
        assert_eq!(queue.occupancy(), 11);
    }

    #[test]
    fn test_pop_wakes_on_push() {
        let queue = Arc::new(ByteQueue::new(64).unwrap());
        queue.open();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut out = [0u8; 64];
                let n = queue.pop(&mut out).unwrap();
                out[..n].to_vec()
            })
        };

        thread::sleep(Duration::from_millis(20));
        queue.push(b"hello");
        assert_eq!(consumer.join().unwrap(), b"hello");
    }

    #[test]
    fn test_close_wakes_all_waiters() {
        let queue = Arc::new(ByteQueue::new(64).unwrap());
        queue.open();

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut out = [0u8; 8];
                    queue.pop(&mut out)
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        assert!(queue.close());
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), None);
        }
        assert!(!queue.close());
    }

    #[test]
    fn test_concurrent_push_pop_drains_completely() {
        let queue = Arc::new(ByteQueue::new(256).unwrap());
        queue.open();

        let producers: Vec<_> = (0..4)
            .map(|i| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut accepted = 0;
                    for _ in 0..200 {
                        accepted += queue.push(&[i as u8; 13]).accepted;
                    }
                    accepted
                })
            })
            .collect();

        let mut drained = 0;
        let mut out = [0u8; 100];
        let accepted: usize = producers.into_iter().map(|p| p.join().unwrap()).sum();
        while drained < accepted {
            drained += queue.try_pop(&mut out);
        }

        assert_eq!(drained, accepted);
        assert_eq!(queue.occupancy(), 0);
    }

    #[test]
    fn test_release() {
        let queue = ByteQueue::new(32).unwrap();
        queue.push(b"secret");
        queue.release();
        assert!(queue.is_released());
        assert_eq!(queue.occupancy(), 0);
    }
}
