use std::collections::VecDeque;

/// Bounded FIFO of recently served fact strings.
///
/// Matching is by exact string equality, so identical text living in two
/// themes counts as one entry.
#[derive(Debug, Clone)]
pub struct RecencyWindow {
    entries: VecDeque<String>,
    capacity: usize,
}

impl RecencyWindow {
    pub const DEFAULT_CAPACITY: usize = 5;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, fact: &str) -> bool {
        self.entries.iter().any(|recent| recent == fact)
    }

    /// Append `fact`, evicting the oldest entry once the window is full.
    pub fn record(&mut self, fact: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(fact.into());
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl Default for RecencyWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
