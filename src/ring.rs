//! Fixed-capacity ring of f64 samples.
//! Pre-allocated at construction, never grows. Pushing into a full ring
//! overwrites the oldest sample.

/// Fixed-size ring buffer for scalar samples (WPM readings, recent positions).
#[derive(Debug, Clone)]
pub struct FloatRing {
    buffer: Box<[f64]>,
    write_pos: usize,
    len: usize,
}

impl FloatRing {
    /// Create a ring holding at most `capacity` samples. A zero capacity is
    /// bumped to one so the ring can always hold the latest value.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![0.0; capacity].into_boxed_slice(),
            write_pos: 0,
            len: 0,
        }
    }

    /// Append a sample, evicting the oldest one when full. O(1).
    #[inline]
    pub fn push(&mut self, value: f64) {
        self.buffer[self.write_pos] = value;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        if self.len < self.buffer.len() {
            self.len += 1;
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Index of the oldest retained sample inside `buffer`.
    #[inline]
    fn start(&self) -> usize {
        let cap = self.buffer.len();
        (self.write_pos + cap - self.len) % cap
    }

    /// Oldest retained sample.
    pub fn first(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        Some(self.buffer[self.start()])
    }

    /// Most recent sample.
    pub fn last(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        let cap = self.buffer.len();
        Some(self.buffer[(self.write_pos + cap - 1) % cap])
    }

    /// Samples oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let start = self.start();
        let cap = self.buffer.len();
        (0..self.len).map(move |i| self.buffer[(start + i) % cap])
    }

    /// Mean of the most recent `n` samples (all samples if fewer). 0 when empty.
    pub fn mean_last(&self, n: usize) -> f64 {
        let n = n.min(self.len);
        if n == 0 {
            return 0.0;
        }
        let sum: f64 = self.iter().skip(self.len - n).sum();
        sum / n as f64
    }

    /// Mean of all retained samples. 0 when empty.
    pub fn mean(&self) -> f64 {
        self.mean_last(self.len)
    }

    /// Snapshot oldest-first. Allocates; used for state emission, not per sample.
    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }

    /// Drop every sample, keeping the allocation.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_first() {
        let mut ring = FloatRing::new(3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            ring.push(v);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.to_vec(), vec![3.0, 4.0, 5.0]);
        assert_eq!(ring.first(), Some(3.0));
        assert_eq!(ring.last(), Some(5.0));
    }

    #[test]
    fn mean_last_uses_newest_samples() {
        let mut ring = FloatRing::new(5);
        for v in [10.0, 20.0, 30.0, 40.0] {
            ring.push(v);
        }
        assert_eq!(ring.mean_last(2), 35.0);
        assert_eq!(ring.mean_last(100), 25.0);
        assert_eq!(ring.mean(), 25.0);
    }

    #[test]
    fn empty_ring_degrades_to_zero() {
        let ring = FloatRing::new(0);
        assert_eq!(ring.capacity(), 1);
        assert!(ring.is_empty());
        assert_eq!(ring.mean(), 0.0);
        assert_eq!(ring.first(), None);
        assert_eq!(ring.last(), None);
    }

    #[test]
    fn clear_resets_contents() {
        let mut ring = FloatRing::new(2);
        ring.push(1.0);
        ring.push(2.0);
        ring.clear();
        assert!(ring.is_empty());
        ring.push(7.0);
        assert_eq!(ring.to_vec(), vec![7.0]);
    }
}
