use std::collections::VecDeque;

/// Unbounded FIFO queue that keeps track of its peak length.
pub struct Queue<T> {
    items: VecDeque<T>,
    peak: usize,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            peak: 0,
        }
    }
}

impl<T> Queue<T> {
    /// Adds `value` at the back.
    pub fn push_back(&mut self, value: T) {
        self.items.push_back(value);
        self.peak = self.peak.max(self.items.len());
    }

    /// Takes the oldest value.
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Current length.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Peak length since the queue was created.
    pub fn max_len(&self) -> usize {
        self.peak
    }
}
