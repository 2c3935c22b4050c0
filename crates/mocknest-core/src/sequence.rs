//! Per-mock sequence cursors
//!
//! Each matched request advances its record's counter exactly once; the
//! counter drives which element of a response sequence is served. The
//! whole table resets on catalog swap.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Monotonic per-mock counters keyed by record name
#[derive(Debug, Default)]
pub struct SequenceCursors {
    counters: Mutex<HashMap<String, u64>>,
}

impl SequenceCursors {
    /// Create an empty cursor table
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current value for `name` and advance it. The read and
    /// the increment are one atomic step: two concurrent matches of the
    /// same mock observe distinct consecutive values.
    pub fn advance(&self, name: &str) -> u64 {
        let mut counters = self.counters.lock();
        let slot = counters.entry(name.to_string()).or_insert(0);
        let current = *slot;
        *slot += 1;
        current
    }

    /// Current value without advancing (0 when never matched)
    pub fn peek(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// Drop all counters (catalog swap)
    pub fn reset(&self) {
        self.counters.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn advances_monotonically_per_name() {
        let cursors = SequenceCursors::new();
        assert_eq!(cursors.advance("a"), 0);
        assert_eq!(cursors.advance("a"), 1);
        assert_eq!(cursors.advance("b"), 0);
        assert_eq!(cursors.advance("a"), 2);
        assert_eq!(cursors.peek("a"), 3);
    }

    #[test]
    fn reset_clears_everything() {
        let cursors = SequenceCursors::new();
        cursors.advance("a");
        cursors.advance("b");
        cursors.reset();
        assert_eq!(cursors.advance("a"), 0);
        assert_eq!(cursors.advance("b"), 0);
    }

    #[tokio::test]
    async fn concurrent_advances_are_distinct() {
        let cursors = Arc::new(SequenceCursors::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cursors = cursors.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..50 {
                    seen.push(cursors.advance("shared"));
                }
                seen
            }));
        }
        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        let expected: Vec<u64> = (0..400).collect();
        assert_eq!(all, expected);
    }
}
