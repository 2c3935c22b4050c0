//! Capture of served request/response pairs and export as a new catalog

use crate::catalog::{MockCatalog, MockRecord, RequestPredicate, ResponseItem, ResponseSpec};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One captured exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedExchange {
    /// Capture time
    pub timestamp: DateTime<Utc>,
    /// Request method
    pub method: String,
    /// Request target (path plus query)
    pub uri: String,
    /// Path component only (export key)
    pub path: String,
    /// Request headers
    pub request_headers: HashMap<String, String>,
    /// Request body
    pub request_body: String,
    /// Response status
    pub status: u16,
    /// Response headers
    pub response_headers: HashMap<String, String>,
    /// Response body as written
    pub response_body: String,
}

#[derive(Debug, Default)]
struct RecorderInner {
    enabled: bool,
    exchanges: Vec<RecordedExchange>,
}

/// Thread-safe recording of served traffic. Disabled by default; bounded
/// only by caller discipline.
#[derive(Debug, Default)]
pub struct Recorder {
    inner: Mutex<RecorderInner>,
}

impl Recorder {
    /// Create a stopped, empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin capturing
    pub fn start(&self) {
        self.inner.lock().enabled = true;
    }

    /// Stop capturing; existing captures stay available
    pub fn stop(&self) {
        self.inner.lock().enabled = false;
    }

    /// Whether capture is on
    pub fn is_recording(&self) -> bool {
        self.inner.lock().enabled
    }

    /// Drop all captures (does not change the enabled flag)
    pub fn clear(&self) {
        self.inner.lock().exchanges.clear();
    }

    /// Number of captures held
    pub fn count(&self) -> usize {
        self.inner.lock().exchanges.len()
    }

    /// Copy of all captures in arrival order
    pub fn list(&self) -> Vec<RecordedExchange> {
        self.inner.lock().exchanges.clone()
    }

    /// Append one exchange when recording is enabled
    pub fn record(&self, exchange: RecordedExchange) {
        let mut inner = self.inner.lock();
        if inner.enabled {
            inner.exchanges.push(exchange);
        }
    }

    /// Export captures as a fresh catalog.
    ///
    /// With `group_by_uri` every `(method, path)` pair becomes one mock; a
    /// pair with several captures gets a cycle-mode sequence. This is
    /// lossy on request bodies — the exported predicate is method + path
    /// only. Ungrouped export emits one mock per capture in order.
    pub fn export(&self, group_by_uri: bool) -> MockCatalog {
        let exchanges = self.list();
        let mut mocks = Vec::new();

        if group_by_uri {
            // Group while preserving first-seen order.
            let mut order: Vec<(String, String)> = Vec::new();
            let mut groups: HashMap<(String, String), Vec<&RecordedExchange>> = HashMap::new();
            for exchange in &exchanges {
                let key = (exchange.method.clone(), exchange.path.clone());
                if !groups.contains_key(&key) {
                    order.push(key.clone());
                }
                groups.entry(key).or_default().push(exchange);
            }
            for (index, key) in order.iter().enumerate() {
                let members = &groups[key];
                let mut record = exported_record(members[0], index);
                if members.len() > 1 {
                    record.response = ResponseSpec {
                        sequence: members.iter().map(|e| exported_item(e)).collect(),
                        ..Default::default()
                    };
                }
                mocks.push(record);
            }
        } else {
            for (index, exchange) in exchanges.iter().enumerate() {
                mocks.push(exported_record(exchange, index));
            }
        }

        MockCatalog { mocks }
    }
}

fn exported_item(exchange: &RecordedExchange) -> ResponseItem {
    ResponseItem {
        status_code: exchange.status,
        headers: exchange.response_headers.clone(),
        body: exchange.response_body.clone(),
        ..Default::default()
    }
}

fn exported_record(exchange: &RecordedExchange, index: usize) -> MockRecord {
    MockRecord {
        request: RequestPredicate {
            uri: Some(exchange.path.clone()),
            method: Some(exchange.method.clone()),
            ..Default::default()
        },
        response: ResponseSpec {
            status_code: exchange.status,
            headers: exchange.response_headers.clone(),
            body: exchange.response_body.clone(),
            ..Default::default()
        },
        ..MockRecord::new(format!(
            "recorded-{}-{}",
            exchange.method.to_lowercase(),
            index
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(method: &str, path: &str, status: u16, body: &str) -> RecordedExchange {
        RecordedExchange {
            timestamp: Utc::now(),
            method: method.to_string(),
            uri: path.to_string(),
            path: path.to_string(),
            request_headers: HashMap::new(),
            request_body: String::new(),
            status,
            response_headers: HashMap::new(),
            response_body: body.to_string(),
        }
    }

    #[test]
    fn records_only_while_enabled() {
        let recorder = Recorder::new();
        recorder.record(exchange("GET", "/a", 200, "x"));
        assert_eq!(recorder.count(), 0);

        recorder.start();
        recorder.record(exchange("GET", "/a", 200, "x"));
        recorder.stop();
        recorder.record(exchange("GET", "/b", 200, "y"));
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn ungrouped_export_is_one_mock_per_capture() {
        let recorder = Recorder::new();
        recorder.start();
        recorder.record(exchange("GET", "/a", 200, "one"));
        recorder.record(exchange("POST", "/b", 201, "two"));
        recorder.record(exchange("GET", "/a", 200, "three"));

        let catalog = recorder.export(false);
        assert_eq!(catalog.mocks.len(), 3);
        assert_eq!(catalog.mocks[0].response.body, "one");
        assert_eq!(catalog.mocks[1].response.status_code, 201);
        assert_eq!(catalog.mocks[2].response.body, "three");
        assert_eq!(catalog.mocks[0].request.uri.as_deref(), Some("/a"));
    }

    #[test]
    fn grouped_export_collapses_to_cycle_sequence() {
        let recorder = Recorder::new();
        recorder.start();
        recorder.record(exchange("GET", "/a", 200, "one"));
        recorder.record(exchange("GET", "/a", 200, "two"));
        recorder.record(exchange("POST", "/b", 201, "solo"));

        let catalog = recorder.export(true);
        assert_eq!(catalog.mocks.len(), 2);

        let grouped = &catalog.mocks[0];
        assert_eq!(grouped.response.sequence.len(), 2);
        assert_eq!(grouped.response.sequence[0].body, "one");
        assert_eq!(grouped.response.sequence[1].body, "two");
        assert_eq!(
            grouped.response.sequence_mode,
            crate::catalog::SequenceMode::Cycle
        );

        let solo = &catalog.mocks[1];
        assert!(solo.response.sequence.is_empty());
        assert_eq!(solo.response.body, "solo");
    }

    #[test]
    fn exported_catalog_parses_back() {
        let recorder = Recorder::new();
        recorder.start();
        recorder.record(exchange("GET", "/a", 200, "body"));
        let yaml = recorder.export(false).to_yaml().unwrap();
        let reparsed = MockCatalog::from_yaml(&yaml).unwrap();
        assert_eq!(reparsed.mocks.len(), 1);
        assert_eq!(reparsed.mocks[0].response.body, "body");
    }

    #[test]
    fn clear_drops_captures() {
        let recorder = Recorder::new();
        recorder.start();
        recorder.record(exchange("GET", "/a", 200, "x"));
        recorder.clear();
        assert_eq!(recorder.count(), 0);
        assert!(recorder.is_recording());
    }
}
