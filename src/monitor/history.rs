//! Bounded rolling history
//!
//! Fixed-capacity FIFO over recent observations. Appending beyond
//! capacity evicts the oldest entry, so the window always holds the
//! latest N values in arrival order.

use std::collections::VecDeque;

/// Entries retained per history window
pub const HISTORY_DEPTH: usize = 5;

#[derive(Debug, Clone)]
pub struct HistoryWindow<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryWindow<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest when the window is full
    pub fn push(&mut self, entry: T) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest to newest
    pub fn oldest_first(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Newest to oldest
    pub fn newest_first(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().rev()
    }
}

impl<T: Clone> HistoryWindow<T> {
    /// Snapshot of the window, newest entry first
    pub fn to_display_vec(&self) -> Vec<T> {
        self.newest_first().cloned().collect()
    }
}

impl<T> Default for HistoryWindow<T> {
    fn default() -> Self {
        Self::new(HISTORY_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_evicts_oldest_beyond_capacity() {
        let mut window = HistoryWindow::default();
        for value in 1..=6 {
            window.push(value);
        }

        assert_eq!(window.len(), HISTORY_DEPTH);
        let oldest_first: Vec<i32> = window.oldest_first().copied().collect();
        assert_eq!(oldest_first, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_newest_first_reverses_arrival_order() {
        let mut window = HistoryWindow::new(3);
        window.push("a");
        window.push("b");
        window.push("c");

        let newest_first: Vec<&str> = window.newest_first().copied().collect();
        assert_eq!(newest_first, vec!["c", "b", "a"]);
        assert_eq!(window.to_display_vec(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_partial_window_keeps_all_entries() {
        let mut window: HistoryWindow<u64> = HistoryWindow::default();
        assert!(window.is_empty());

        window.push(10);
        window.push(20);

        assert_eq!(window.len(), 2);
        assert_eq!(window.to_display_vec(), vec![20, 10]);
    }

    #[test]
    fn test_zero_capacity_clamps_to_one() {
        let mut window = HistoryWindow::new(0);
        window.push(1);
        window.push(2);

        assert_eq!(window.len(), 1);
        assert_eq!(window.to_display_vec(), vec![2]);
    }
}
