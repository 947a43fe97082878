// src/circular/buffer.rs
//! Fixed-capacity byte ring with drop-on-overflow writes.
//!
//! # Overflow policy
//!
//! A write never blocks and never overwrites unread bytes. It accepts as many
//! bytes as currently fit and reports that count; the rest of the write is
//! discarded. Callers detect overflow by comparing the returned count against
//! the input length.
//!
//! # Memory
//!
//! Storage is allocated once, up front, with a fallible reservation so an
//! oversized capacity surfaces as an error instead of an abort. Released
//! storage is zeroed with `zeroize` before it is freed.
//!
//! The ring is not synchronised; [`crate::shared::ByteQueue`] puts it behind a
//! lock for cross-thread use.

use crate::error::InitError;
use zeroize::Zeroize;

/// Largest capacity a ring may be created with (1 GiB).
pub const MAX_RING_CAPACITY: usize = 1 << 30;

/// A bounded circular byte buffer.
///
/// # Example
///
/// ```rust
/// use udpring::RingBuffer;
///
/// let mut ring = RingBuffer::with_capacity(16)?;
/// assert_eq!(ring.write(b"0123456789abcdefXYZW"), 16);
/// assert!(ring.is_full());
///
/// let mut out = [0u8; 4];
/// assert_eq!(ring.read(&mut out), 4);
/// assert_eq!(&out, b"0123");
/// # Ok::<(), udpring::InitError>(())
/// ```
pub struct RingBuffer {
    /// Backing storage; `None` once released
    data: Option<Box<[u8]>>,
    capacity: usize,
    used: usize,
    read_pos: usize,
    write_pos: usize,
    /// Whether capacity is a power of two (enables mask wrapping)
    is_pow2: bool,
}

impl RingBuffer {
    /// Allocates a ring holding up to `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`InitError::Allocation`] if `capacity` is zero, larger than
    /// [`MAX_RING_CAPACITY`], or the allocator refuses the reservation.
    pub fn with_capacity(capacity: usize) -> Result<Self, InitError> {
        if capacity == 0 || capacity > MAX_RING_CAPACITY {
            return Err(InitError::Allocation { bytes: capacity });
        }

        let mut storage: Vec<u8> = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| InitError::Allocation { bytes: capacity })?;
        storage.resize(capacity, 0);

        Ok(Self {
            data: Some(storage.into_boxed_slice()),
            capacity,
            used: 0,
            read_pos: 0,
            write_pos: 0,
            is_pow2: capacity.is_power_of_two(),
        })
    }

    /// Bytes currently stored.
    #[inline(always)]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Free space left for writing.
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.capacity - self.used
    }

    /// Total capacity in bytes.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if no bytes are stored.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Returns `true` if no more bytes can be written.
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.used == self.capacity
    }

    /// Returns `true` once [`release`](Self::release) has freed the storage.
    pub fn is_released(&self) -> bool {
        self.data.is_none()
    }

    #[inline(always)]
    fn wrap_pos(&self, pos: usize, delta: usize) -> usize {
        let new_pos = pos + delta;
        if self.is_pow2 {
            new_pos & (self.capacity - 1)
        } else {
            new_pos % self.capacity
        }
    }

    /// Writes as much of `data` as fits and returns the number of bytes
    /// accepted. The remainder is dropped.
    ///
    /// A released ring accepts nothing.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let to_write = data.len().min(self.available());
        if to_write == 0 {
            return 0;
        }
        let write_pos = self.write_pos;
        let capacity = self.capacity;
        let Some(buffer) = self.data.as_mut() else {
            return 0;
        };

        let first = to_write.min(capacity - write_pos);
        buffer[write_pos..write_pos + first].copy_from_slice(&data[..first]);
        let second = to_write - first;
        if second > 0 {
            buffer[..second].copy_from_slice(&data[first..to_write]);
        }

        self.write_pos = self.wrap_pos(write_pos, to_write);
        self.used += to_write;
        to_write
    }

    /// Moves up to `output.len()` bytes out of the ring.
    ///
    /// Returns the number of bytes read, which is zero when the ring is empty.
    pub fn read(&mut self, output: &mut [u8]) -> usize {
        let to_read = output.len().min(self.used);
        if to_read == 0 {
            return 0;
        }
        let read_pos = self.read_pos;
        let Some(buffer) = self.data.as_ref() else {
            return 0;
        };

        let first = to_read.min(self.capacity - read_pos);
        output[..first].copy_from_slice(&buffer[read_pos..read_pos + first]);
        let second = to_read - first;
        if second > 0 {
            output[first..to_read].copy_from_slice(&buffer[..second]);
        }

        self.read_pos = self.wrap_pos(read_pos, to_read);
        self.used -= to_read;
        to_read
    }

    /// Copies up to `output.len()` bytes without consuming them.
    pub fn peek(&self, output: &mut [u8]) -> usize {
        let to_read = output.len().min(self.used);
        let Some(buffer) = self.data.as_ref() else {
            return 0;
        };

        let mut read = 0;
        let mut pos = self.read_pos;
        while read < to_read {
            let chunk = (to_read - read).min(self.capacity - pos);
            output[read..read + chunk].copy_from_slice(&buffer[pos..pos + chunk]);
            pos = self.wrap_pos(pos, chunk);
            read += chunk;
        }
        read
    }

    /// Discards all stored bytes, keeping the storage.
    #[inline]
    pub fn clear(&mut self) {
        self.used = 0;
        self.read_pos = 0;
        self.write_pos = 0;
    }

    /// Zeroes and frees the storage. Further writes accept nothing.
    ///
    /// Calling it again is a no-op.
    pub fn release(&mut self) {
        if let Some(data) = self.data.take() {
            let mut vec = data.into_vec();
            vec.zeroize();
        }
        self.clear();
    }
}

impl Drop for RingBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("used", &self.used)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_basic() {
        let ring = RingBuffer::with_capacity(256).unwrap();
        assert_eq!(ring.capacity(), 256);
        assert_eq!(ring.used(), 0);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_write_read() {
        let mut ring = RingBuffer::with_capacity(256).unwrap();

        assert_eq!(ring.write(b"Hello"), 5);
        assert_eq!(ring.used(), 5);

        let mut output = vec![0u8; 5];
        assert_eq!(ring.read(&mut output), 5);
        assert_eq!(&output, b"Hello");
        assert!(ring.is_empty());
    }

    #[test]
    fn test_overflow_accepts_prefix() {
        let mut ring = RingBuffer::with_capacity(16).unwrap();
        let accepted = ring.write(&[0xAB; 20]);

        assert_eq!(accepted, 16);
        assert_eq!(ring.used(), 16);
        assert!(ring.is_full());
        assert_eq!(ring.write(b"more"), 0);
    }

    #[test]
    fn test_wrap_around() {
        let mut ring = RingBuffer::with_capacity(8).unwrap();

        ring.write(b"12345");
        let mut tmp = vec![0u8; 3];
        ring.read(&mut tmp);

        assert_eq!(ring.write(b"6789"), 4);
        assert_eq!(ring.used(), 6);

        let mut output = vec![0u8; 6];
        assert_eq!(ring.read(&mut output), 6);
        assert_eq!(&output, b"456789");
    }

    #[test]
    fn test_wrap_around_non_pow2() {
        let mut ring = RingBuffer::with_capacity(10).unwrap();

        ring.write(b"abcdefgh");
        let mut tmp = [0u8; 6];
        ring.read(&mut tmp);

        assert_eq!(ring.write(b"ijklmnop"), 8);
        assert!(ring.is_full());

        let mut output = [0u8; 10];
        assert_eq!(ring.read(&mut output), 10);
        assert_eq!(&output, b"ghijklmnop");
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut ring = RingBuffer::with_capacity(32).unwrap();
        ring.write(b"peekaboo");

        let mut out = [0u8; 4];
        assert_eq!(ring.peek(&mut out), 4);
        assert_eq!(&out, b"peek");
        assert_eq!(ring.used(), 8);
    }

    #[test]
    fn test_occupancy_stays_bounded() {
        let mut ring = RingBuffer::with_capacity(64).unwrap();
        let mut written = 0usize;
        let mut read = 0usize;
        let mut out = [0u8; 23];

        for i in 0..500usize {
            let chunk = vec![i as u8; (i * 7) % 41];
            written += ring.write(&chunk);
            assert!(ring.used() <= ring.capacity());
            if i % 3 == 0 {
                read += ring.read(&mut out);
            }
            assert_eq!(ring.used(), written - read);
        }

        while !ring.is_empty() {
            read += ring.read(&mut out);
        }
        assert_eq!(written, read);
        assert_eq!(ring.used(), 0);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            RingBuffer::with_capacity(0),
            Err(InitError::Allocation { bytes: 0 })
        ));
        assert!(RingBuffer::with_capacity(MAX_RING_CAPACITY + 1).is_err());
    }

    #[test]
    fn test_release() {
        let mut ring = RingBuffer::with_capacity(1024).unwrap();
        ring.write(b"sensitive");
        ring.release();

        assert!(ring.is_empty());
        assert!(ring.is_released());
        assert_eq!(ring.write(b"late"), 0);
        ring.release();
    }
}
