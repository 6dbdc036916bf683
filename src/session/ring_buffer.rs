use std::collections::VecDeque;

use crate::device::constants::RING_BUFFER_CAPACITY;

/// A sliding window of the most recent samples of one channel.
///
/// The window always holds exactly `RING_BUFFER_CAPACITY` samples. It starts out filled with
/// `T::default()` and every push evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    samples: VecDeque<T>,
}

impl<T: Clone + Default> RingBuffer<T> {
    pub fn new() -> Self {
        let mut samples = VecDeque::with_capacity(RING_BUFFER_CAPACITY);
        samples.resize(RING_BUFFER_CAPACITY, T::default());
        RingBuffer { samples }
    }

    pub fn push(&mut self, sample: T) {
        self.samples.pop_front();
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&T> {
        self.samples.back()
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.samples.iter().cloned().collect()
    }
}

impl<T: Clone + Default> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_full_of_defaults() {
        let buffer: RingBuffer<u16> = RingBuffer::new();
        assert_eq!(buffer.len(), 256);
        assert!(buffer.snapshot().iter().all(|sample| *sample == 0));
    }

    #[test]
    fn length_never_changes() {
        let mut buffer: RingBuffer<u16> = RingBuffer::new();
        for i in 0..1000u16 {
            buffer.push(i);
            assert_eq!(buffer.len(), 256);
        }
    }

    #[test]
    fn evicts_oldest_first() {
        let mut buffer: RingBuffer<u16> = RingBuffer::new();
        for i in 1..=300u16 {
            buffer.push(i);
        }

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.first(), Some(&45));
        assert_eq!(snapshot.last(), Some(&300));
        assert_eq!(buffer.latest(), Some(&300));
        assert!(snapshot.windows(2).all(|pair| pair[0] + 1 == pair[1]));
    }

    #[test]
    fn partially_filled_keeps_zero_prefix() {
        let mut buffer: RingBuffer<f64> = RingBuffer::new();
        buffer.push(1.5);
        buffer.push(2.5);

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 256);
        assert_eq!(&snapshot[254..], &[1.5, 2.5]);
        assert!(snapshot[..254].iter().all(|sample| *sample == 0.0));
    }
}
