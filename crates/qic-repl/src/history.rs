//! Bounded session history for `\hist` and numeric back-references.

use std::collections::VecDeque;

/// Entries kept before the oldest is evicted.
pub const HISTORY_CAPACITY: usize = 200;

/// Submitted commands, oldest first.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest entry when full.
    pub fn push(&mut self, entry: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.into());
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_first() {
        let mut history = History::with_capacity(2);
        history.push("a");
        history.push("b");
        history.push("c");
        assert_eq!(history.iter().collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(history.get(0), Some("b"));
        assert_eq!(history.get(2), None);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut history = History::with_capacity(0);
        history.push("a");
        assert!(history.is_empty());
    }
}
