//! Single-producer/single-consumer sample ring
//!
//! The hand-off point between the emulation core and the host's audio
//! thread. The producer owns the write index, the consumer owns the read
//! index, and each stereo pair is stored bit-packed in one atomic word, so
//! the ring is lock-free without any unsafe code. Capacity comfortably
//! exceeds one frame of audio at 44.1 kHz (~735 pairs); an underrun simply
//! yields `None` and the consumer substitutes silence.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Default ring capacity in stereo pairs
pub const RING_CAPACITY: usize = 2048;

/// Lock-free stereo sample ring
pub struct SampleRing {
    slots: Vec<AtomicU64>,
    write: AtomicUsize,
    read: AtomicUsize,
}

impl SampleRing {
    /// Create a ring with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(RING_CAPACITY)
    }

    /// Create a ring holding `capacity` stereo pairs
    pub fn with_capacity(capacity: usize) -> Self {
        SampleRing {
            slots: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
        }
    }

    /// Number of pairs currently queued
    pub fn len(&self) -> usize {
        self.write
            .load(Ordering::Acquire)
            .wrapping_sub(self.read.load(Ordering::Acquire))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue one stereo pair. Returns false (dropping the pair) when the
    /// ring is full; the producer is outrunning the consumer and the
    /// freshest audio wins once the consumer catches up.
    pub fn push(&self, left: f32, right: f32) -> bool {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        if write.wrapping_sub(read) >= self.slots.len() {
            return false;
        }

        let packed = ((left.to_bits() as u64) << 32) | right.to_bits() as u64;
        self.slots[write % self.slots.len()].store(packed, Ordering::Relaxed);
        self.write.store(write.wrapping_add(1), Ordering::Release);
        true
    }

    /// Dequeue one stereo pair, or `None` on underrun
    pub fn pop(&self) -> Option<(f32, f32)> {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);
        if read == write {
            return None;
        }

        let packed = self.slots[read % self.slots.len()].load(Ordering::Relaxed);
        self.read.store(read.wrapping_add(1), Ordering::Release);

        let left = f32::from_bits((packed >> 32) as u32);
        let right = f32::from_bits(packed as u32);
        Some((left, right))
    }
}

impl Default for SampleRing {
    fn default() -> Self {
        SampleRing::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn push_pop_round_trips_pairs() {
        let ring = SampleRing::with_capacity(8);
        assert!(ring.push(0.25, -0.5));
        assert!(ring.push(1.0, 0.0));
        assert_eq!(ring.pop(), Some((0.25, -0.5)));
        assert_eq!(ring.pop(), Some((1.0, 0.0)));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn full_ring_rejects_pushes() {
        let ring = SampleRing::with_capacity(2);
        assert!(ring.push(0.0, 0.0));
        assert!(ring.push(0.0, 0.0));
        assert!(!ring.push(1.0, 1.0));

        ring.pop();
        assert!(ring.push(1.0, 1.0));
    }

    #[test]
    fn works_across_threads() {
        let ring = Arc::new(SampleRing::new());
        let producer = Arc::clone(&ring);

        let handle = std::thread::spawn(move || {
            for i in 0..1000 {
                while !producer.push(i as f32, -(i as f32)) {
                    std::thread::yield_now();
                }
            }
        });

        let mut received = 0u32;
        while received < 1000 {
            if let Some((left, right)) = ring.pop() {
                assert_eq!(left, received as f32);
                assert_eq!(right, -(received as f32));
                received += 1;
            } else {
                std::thread::yield_now();
            }
        }

        handle.join().unwrap();
    }
}
