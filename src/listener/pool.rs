// src/listener/pool.rs
//! Listener thread bodies.
//!
//! ```text
//! poll(1s) -> recv_from(scratch) -> lock -> ring.write -> notify_all -> unlock
//! ```
//!
//! The socket read happens outside the buffer lock; only the ring write is
//! inside it.

use super::socket::{ListenerSlot, SOCKET_TOKEN};
use crate::shared::{ByteQueue, EngineStats};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use mio::Events;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroize;

/// Largest datagram a listener reads in one call (64 KiB).
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Readiness wait bound; also the worst-case delay before a listener notices
/// a stop request.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Datagrams the single-receiver hand-off channel can hold.
pub const HANDOFF_DEPTH: usize = 1024;

const EVENT_CAPACITY: usize = 16;

/// References every listener thread holds.
#[derive(Clone)]
pub(crate) struct ListenerContext {
    pub(crate) queue: Arc<ByteQueue>,
    pub(crate) stats: Arc<EngineStats>,
}

impl ListenerContext {
    /// Pushes one datagram into the ring, recording overflow.
    ///
    /// Returns the running flag seen under the lock.
    fn store(&self, index: usize, datagram: &[u8]) -> bool {
        let outcome = self.queue.push(datagram);
        if outcome.overflowed() {
            self.stats.record_overflow(outcome.dropped);
            log::warn!(
                "[UDP-LISTEN] listener {}: buffer full, dropped {} of {} bytes",
                index,
                outcome.dropped,
                datagram.len()
            );
        }
        outcome.running
    }
}

/// Where a receiving listener sends what it reads.
pub(crate) enum Sink {
    /// Write straight into the ring
    Direct,
    /// Hand off to distributor listeners. The receiving listener keeps its
    /// own end of the channel to flush leftovers into the ring on exit.
    Forward {
        tx: Sender<Vec<u8>>,
        backlog: Receiver<Vec<u8>>,
    },
}

impl Sink {
    fn deliver(&self, ctx: &ListenerContext, index: usize, datagram: &[u8]) -> bool {
        match self {
            Self::Direct => ctx.store(index, datagram),
            Self::Forward { tx, .. } => match tx.try_send(datagram.to_vec()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    ctx.stats.record_overflow(datagram.len());
                    log::warn!(
                        "[UDP-LISTEN] listener {}: hand-off queue full, dropped {} bytes",
                        index,
                        datagram.len()
                    );
                    true
                }
                Err(TrySendError::Disconnected(_)) => {
                    ctx.store(index, datagram);
                    false
                }
            },
        }
    }

    /// Moves anything still queued for distributors into the ring.
    fn flush(&self, ctx: &ListenerContext, index: usize) {
        if let Self::Forward { backlog, .. } = self {
            drain_pending(backlog, ctx, index);
        }
    }
}

/// Stores every datagram already waiting in `rx` without blocking.
fn drain_pending(rx: &Receiver<Vec<u8>>, ctx: &ListenerContext, index: usize) {
    for mut datagram in rx.try_iter() {
        ctx.store(index, &datagram);
        datagram.zeroize();
    }
}

/// Polls the shared socket until the running flag clears.
///
/// Returns the slot so the engine can reuse the registration on the next
/// start. A receive error is logged and the loop goes on; a poll error other
/// than an interrupt ends this thread only.
pub(crate) fn receive_loop(mut slot: ListenerSlot, ctx: ListenerContext, sink: Sink) -> ListenerSlot {
    let index = slot.index;
    let mut events = Events::with_capacity(EVENT_CAPACITY);
    let mut scratch = vec![0u8; MAX_DATAGRAM_SIZE];
    log::debug!(
        "[UDP-LISTEN] listener {} started thread={:?}",
        index,
        std::thread::current().id()
    );

    'poll: while ctx.queue.is_running() {
        if let Err(e) = slot.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            log::error!("[UDP-LISTEN] listener {} poll failed: {}, exiting", index, e);
            break;
        }

        for event in events.iter() {
            if event.token() != SOCKET_TOKEN {
                continue;
            }
            // Readiness is edge-triggered: drain until the socket would block.
            loop {
                match slot.socket.recv_from(&mut scratch) {
                    Ok((len, src)) => {
                        ctx.stats.record_datagram(len);
                        log::trace!("[UDP-LISTEN] listener {} recv len={} src={}", index, len, src);
                        if !sink.deliver(&ctx, index, &scratch[..len]) {
                            break 'poll;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        ctx.stats.record_recv_error();
                        log::error!("[UDP-LISTEN] listener {} recv_from failed: {}", index, e);
                        break;
                    }
                }
            }
        }
    }

    sink.flush(&ctx, index);
    scratch.zeroize();
    log::debug!("[UDP-LISTEN] listener {} stopped", index);
    slot
}

/// Moves datagrams from the hand-off channel into the ring.
///
/// Exits when the receiver hangs up or the running flag clears. Datagrams
/// still in the channel at that point are stored before exiting.
pub(crate) fn distribute_loop(index: usize, rx: Receiver<Vec<u8>>, ctx: ListenerContext) {
    log::debug!("[UDP-LISTEN] distributor {} started", index);
    loop {
        match rx.recv_timeout(POLL_TIMEOUT) {
            Ok(mut datagram) => {
                let running = ctx.store(index, &datagram);
                datagram.zeroize();
                if !running {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if !ctx.queue.is_running() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    drain_pending(&rx, &ctx, index);
    log::debug!("[UDP-LISTEN] distributor {} stopped", index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;

    fn context(capacity: usize) -> ListenerContext {
        ListenerContext {
            queue: Arc::new(ByteQueue::new(capacity).unwrap()),
            stats: Arc::new(EngineStats::default()),
        }
    }

    #[test]
    fn test_store_records_overflow() {
        let ctx = context(16);
        ctx.queue.open();

        assert!(ctx.store(0, &[1u8; 20]));
        let snap = ctx.stats.snapshot();
        assert_eq!(snap.overflow_events, 1);
        assert_eq!(snap.bytes_dropped, 4);
        assert_eq!(ctx.queue.occupancy(), 16);
    }

    #[test]
    fn test_forward_full_drops_datagram() {
        let ctx = context(64);
        let (tx, backlog) = channel::bounded(1);
        let sink = Sink::Forward { tx, backlog };

        assert!(sink.deliver(&ctx, 0, b"first"));
        assert!(sink.deliver(&ctx, 0, b"second"));
        assert_eq!(ctx.stats.snapshot().bytes_dropped, 6);
    }

    #[test]
    fn test_distributor_exits_on_hangup() {
        let ctx = context(64);
        ctx.queue.open();
        let (tx, rx) = channel::bounded(4);
        tx.send(b"abc".to_vec()).unwrap();
        drop(tx);

        distribute_loop(1, rx, ctx.clone());
        assert_eq!(ctx.queue.occupancy(), 3);
    }

    #[test]
    fn test_distributor_stores_backlog_after_stop() {
        let ctx = context(64);
        let (tx, rx) = channel::bounded(4);
        for _ in 0..3 {
            tx.send(vec![9u8; 4]).unwrap();
        }

        // Queue never opened: the first store sees the flag cleared.
        distribute_loop(1, rx, ctx.clone());
        assert_eq!(ctx.queue.occupancy(), 12);
        assert_eq!(ctx.stats.snapshot().bytes_dropped, 0);
        assert!(tx.is_empty());
    }

    #[test]
    fn test_forward_flush_moves_backlog_into_ring() {
        let ctx = context(64);
        let (tx, backlog) = channel::bounded(4);
        let sink = Sink::Forward { tx, backlog };

        assert!(sink.deliver(&ctx, 0, b"left"));
        assert!(sink.deliver(&ctx, 0, b"over"));
        assert_eq!(ctx.queue.occupancy(), 0);

        sink.flush(&ctx, 0);
        let mut out = [0u8; 8];
        assert_eq!(ctx.queue.try_pop(&mut out), 8);
        assert_eq!(&out, b"leftover");
    }
}
