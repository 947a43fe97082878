// src/worker.rs
//! Worker pool: threads that drain the ring and run the data callback.
//!
//! Each worker blocks in [`ByteQueue::pop`] until bytes arrive or the engine
//! stops, copies out at most [`READ_CHUNK_SIZE`] bytes, releases the lock and
//! only then calls the callback. Callbacks on different workers run
//! concurrently and in no particular order.
//!
//! The callback boundary is an isolation point: a panic inside the callback
//! is caught, logged and counted, and the worker keeps draining.

use crate::shared::{ByteQueue, EngineStats};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use zeroize::Zeroize;

/// Most bytes a worker moves out of the ring per wake-up (64 KiB).
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// User function receiving drained bytes.
///
/// The slice is only valid for the duration of the call. Span boundaries do
/// not correspond to datagram boundaries.
pub type DataCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Drains `queue` until the running flag clears.
pub(crate) fn run(
    index: usize,
    queue: Arc<ByteQueue>,
    stats: Arc<EngineStats>,
    callback: Option<DataCallback>,
) {
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    log::debug!(
        "[UDP-WORK] worker {} started thread={:?}",
        index,
        std::thread::current().id()
    );

    while let Some(len) = queue.pop(&mut chunk) {
        if len == 0 {
            continue;
        }
        if let Some(callback) = callback.as_ref() {
            invoke(index, callback, &chunk[..len], &stats);
        }
    }

    chunk.zeroize();
    log::debug!("[UDP-WORK] worker {} stopped", index);
}

fn invoke(index: usize, callback: &DataCallback, bytes: &[u8], stats: &EngineStats) {
    match panic::catch_unwind(AssertUnwindSafe(|| (**callback)(bytes))) {
        Ok(()) => stats.record_delivery(bytes.len()),
        Err(payload) => {
            stats.record_callback_panic();
            log::error!(
                "[UDP-WORK] worker {}: data callback panicked on {} bytes: {}",
                index,
                bytes.len(),
                panic_message(payload.as_ref())
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}
