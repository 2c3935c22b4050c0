//! Bounded trace of processed requests for the dashboard

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One processed request as seen by the intake pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTrace {
    /// When the request arrived
    pub timestamp: DateTime<Utc>,
    /// HTTP method
    pub method: String,
    /// Request target
    pub uri: String,
    /// Response status written
    pub status: u16,
    /// Matched mock name; `None` for 404/proxy; suffixed `(chaos)` on
    /// injected failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    /// Total handling time in milliseconds
    pub duration_ms: u64,
}

/// Append-only ring of request traces; oldest entries fall off at capacity
#[derive(Debug)]
pub struct Tracer {
    entries: Mutex<VecDeque<RequestTrace>>,
    capacity: usize,
}

impl Tracer {
    /// Create a tracer holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Append one trace, discarding the oldest on overflow
    pub fn push(&self, trace: RequestTrace) {
        let mut entries = self.entries.lock();
        if self.capacity > 0 && entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(trace);
    }

    /// Copy of all traces, oldest first
    pub fn list(&self) -> Vec<RequestTrace> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Drop all traces
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of traces held
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no traces are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
