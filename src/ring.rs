// Fixed-capacity ring buffer
// Oldest entries are evicted on overflow; used for every bounded series.

use std::collections::VecDeque;

/// Bounded FIFO. `push_back` evicts from the front, `push_front` evicts from the back.
#[derive(Debug, Clone)]
pub struct Ring<T> {
    buf: VecDeque<T>,
    cap: usize,
}

impl<T> Ring<T> {
    /// Create an empty ring holding at most `cap` entries (minimum 1).
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Ring {
            // Don't preallocate the full capacity; most series stay far below it.
            buf: VecDeque::with_capacity(cap.min(1024)),
            cap,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append at the back; drops the front entry past capacity.
    pub fn push_back(&mut self, value: T) {
        self.buf.push_back(value);
        if self.buf.len() > self.cap {
            self.buf.pop_front();
        }
    }

    /// Insert at the front; drops the back entry past capacity.
    pub fn push_front(&mut self, value: T) {
        self.buf.push_front(value);
        if self.buf.len() > self.cap {
            self.buf.pop_back();
        }
    }

    pub fn front(&self) -> Option<&T> {
        self.buf.front()
    }

    pub fn back(&self) -> Option<&T> {
        self.buf.back()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.buf.get(index)
    }

    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, T> {
        self.buf.iter()
    }

    pub fn iter_mut(&mut self) -> std::collections::vec_deque::IterMut<'_, T> {
        self.buf.iter_mut()
    }

    /// Iterate over the last `n` entries (or all, if fewer), oldest first.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &T> + '_ {
        let skip = self.buf.len().saturating_sub(n);
        self.buf.iter().skip(skip)
    }
}

impl<T: Clone> Ring<T> {
    /// Copy of the last `n` entries, oldest first.
    pub fn snapshot_last(&self, n: usize) -> Vec<T> {
        self.last_n(n).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_back_evicts_oldest() {
        let mut ring = Ring::new(3);
        for i in 0..5 {
            ring.push_back(i);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_push_front_evicts_back() {
        let mut ring = Ring::new(3);
        for i in 0..5 {
            ring.push_front(i);
        }
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![4, 3, 2]);
        assert_eq!(ring.front(), Some(&4));
        assert_eq!(ring.back(), Some(&2));
    }

    #[test]
    fn test_last_n() {
        let mut ring = Ring::new(10);
        for i in 0..6 {
            ring.push_back(i);
        }
        assert_eq!(ring.snapshot_last(2), vec![4, 5]);
        assert_eq!(ring.snapshot_last(100), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut ring = Ring::new(0);
        ring.push_back(1);
        ring.push_back(2);
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.snapshot_last(5), vec![2]);
    }
}
