//! Bounded FIFO shared between the capture callback and the pipeline.
//!
//! The producer (hardware callback) always wins: when the buffer is full the
//! oldest samples are overwritten, so a slow reader loses history instead of
//! stalling the device. Capacity is counted in samples, not bytes.
//!
//! ```rust
//! use voice_command::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(3);
//! assert_eq!(buf.push_slice(&[10_i16, 20, 30, 40]), 1);
//! assert_eq!(buf.drain(), vec![20, 30, 40]);
//! ```

use std::time::Duration;

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity circular buffer.
///
/// Never allocates past its initial capacity. The audio path stores `i16`
/// PCM samples; the type parameter only needs `Copy + Default`.
pub struct RingBuffer<T> {
    slots: Vec<T>,
    /// Index of the oldest stored sample.
    head: usize,
    /// Number of valid samples (≤ `slots.len()`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            slots: vec![T::default(); capacity],
            head: 0,
            len: 0,
        }
    }

    /// Append `data`, overwriting the oldest samples on overflow.
    ///
    /// Returns how many previously stored samples were overwritten.
    pub fn push_slice(&mut self, data: &[T]) -> usize {
        let cap = self.slots.len();
        let mut overwritten = 0;
        for &item in data {
            let tail = (self.head + self.len) % cap;
            self.slots[tail] = item;
            if self.len == cap {
                self.head = (self.head + 1) % cap;
                overwritten += 1;
            } else {
                self.len += 1;
            }
        }
        overwritten
    }

    /// Remove and return every stored sample, oldest first.
    pub fn drain(&mut self) -> Vec<T> {
        let cap = self.slots.len();
        let out = (0..self.len)
            .map(|i| self.slots[(self.head + i) % cap])
            .collect();
        self.clear();
        out
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// `true` when the next push will overwrite.
    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Playback duration of the stored samples at `samples_per_sec`.
    pub fn duration(&self, samples_per_sec: usize) -> Duration {
        if samples_per_sec == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.len as f64 / samples_per_sec as f64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_within_capacity() {
        let mut buf = RingBuffer::new(6);
        assert_eq!(buf.push_slice(&[7_i16, -7, 100]), 0);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.drain(), vec![7, -7, 100]);
        assert!(buf.is_empty());
    }

    #[test]
    fn overflow_keeps_newest_and_counts_overwrites() {
        let mut buf = RingBuffer::new(4);
        let lost = buf.push_slice(&[1_i16, 2, 3, 4, 5, 6, 7]);
        assert_eq!(lost, 3);
        assert!(buf.is_full());
        assert_eq!(buf.drain(), vec![4, 5, 6, 7]);
    }

    #[test]
    fn overflow_across_pushes_preserves_order() {
        let mut buf = RingBuffer::new(3);
        buf.push_slice(&[1_i16, 2]);
        buf.push_slice(&[3, 4]);
        buf.push_slice(&[5]);
        assert_eq!(buf.drain(), vec![3, 4, 5]);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buf = RingBuffer::new(100);
        for chunk in 0..50 {
            buf.push_slice(&vec![chunk as i16; 37]);
            assert!(buf.len() <= buf.capacity());
        }
        assert_eq!(buf.len(), 100);
    }

    #[test]
    fn usable_after_drain_and_clear() {
        let mut buf = RingBuffer::new(2);
        buf.push_slice(&[1_i16, 2, 3]);
        assert_eq!(buf.drain(), vec![2, 3]);
        buf.push_slice(&[9]);
        buf.clear();
        assert_eq!(buf.drain(), Vec::<i16>::new());
        buf.push_slice(&[4]);
        assert_eq!(buf.drain(), vec![4]);
    }

    #[test]
    fn duration_of_stored_samples() {
        let mut buf = RingBuffer::new(32_000);
        buf.push_slice(&vec![0_i16; 4_000]);
        assert_eq!(buf.duration(16_000), Duration::from_millis(250));
        assert_eq!(buf.duration(0), Duration::ZERO);
    }

    #[test]
    #[should_panic(expected = "RingBuffer capacity must be > 0")]
    fn zero_capacity_panics() {
        let _buf: RingBuffer<i16> = RingBuffer::new(0);
    }
}
