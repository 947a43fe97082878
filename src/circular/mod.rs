// src/circular/mod.rs
//! Bounded byte ring used as the engine's shared buffer

pub mod buffer;

pub use buffer::{MAX_RING_CAPACITY, RingBuffer};
