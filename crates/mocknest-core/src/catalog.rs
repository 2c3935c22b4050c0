//! Mock catalog data model and parsing
//!
//! The catalog is the declarative input of the server: a list of mock
//! records, each pairing a request predicate with a response plan. Records
//! are immutable after load; hot reload replaces the whole catalog.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Wire protocol served by a mock record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain request/response HTTP (default)
    #[default]
    Http,
    /// WebSocket upgrade
    Websocket,
    /// Server-Sent Events stream
    Sse,
}

/// Which sub-predicates are interpreted as regular expressions
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RegexFlags {
    /// URI pattern is a regex
    #[serde(default)]
    pub uri: bool,
    /// Method pattern is a regex
    #[serde(default)]
    pub method: bool,
    /// Header names and values are regexes
    #[serde(default)]
    pub headers: bool,
    /// Body pattern is a regex
    #[serde(default)]
    pub body: bool,
}

/// One JSON-path expectation against the request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonPathMatcher {
    /// Dot/bracket path, e.g. `$.user.roles[0]`
    pub path: String,
    /// Expected value at the path
    pub value: serde_json::Value,
    /// Compare as regex against the stringified value
    #[serde(default)]
    pub regex: bool,
}

/// Conjunction of optional request conditions; all present ones must hold
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestPredicate {
    /// Path pattern (exact or regex; never matched against the query)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Method pattern (exact case-insensitive or regex)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Required headers
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Body pattern (exact or regex against the full body text)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Regex-mode switches for the patterns above
    #[serde(default)]
    pub regex: RegexFlags,
    /// Ordered JSON-path expectations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_path: Vec<JsonPathMatcher>,
    /// JSON schema the body must validate against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_schema: Option<serde_json::Value>,
    /// Match script returning `{matches: bool, response?: {...}}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub javascript: Option<String>,
}

impl RequestPredicate {
    /// True when no condition is configured at all
    pub fn is_empty(&self) -> bool {
        self.uri.as_deref().is_none_or(str::is_empty)
            && self.method.as_deref().is_none_or(str::is_empty)
            && self.headers.is_empty()
            && self.body.is_none()
            && self.json_path.is_empty()
            && self.validate_schema.is_none()
            && self.javascript.is_none()
    }
}

/// Latency sampling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyMode {
    /// Constant delay of `min` milliseconds
    #[default]
    Fixed,
    /// Uniform delay in `[min, max]`
    Random,
    /// Percentile buckets: p50 with probability 0.5, p95 with 0.45, p99 with 0.05
    Percentile,
}

/// Artificial latency configuration for a response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencySpec {
    /// Sampling mode
    #[serde(rename = "type", default)]
    pub mode: LatencyMode,
    /// Base / lower bound in milliseconds
    #[serde(default)]
    pub min: u64,
    /// Upper bound in milliseconds (random mode)
    #[serde(default)]
    pub max: u64,
    /// 50th percentile in milliseconds
    #[serde(default)]
    pub p50: u64,
    /// 95th percentile in milliseconds
    #[serde(default)]
    pub p95: u64,
    /// 99th percentile in milliseconds
    #[serde(default)]
    pub p99: u64,
}

/// Probabilistic fault injection for a response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChaosSpec {
    /// Master switch
    #[serde(default)]
    pub enabled: bool,
    /// Probability of failure in `[0, 1]`
    #[serde(default)]
    pub failure_rate: f64,
    /// Status codes drawn uniformly on failure (500 when empty)
    #[serde(default)]
    pub error_codes: Vec<u16>,
    /// Extra latency lower bound (ms) applied on the non-failure path
    #[serde(default)]
    pub latency_min: u64,
    /// Extra latency upper bound (ms) applied on the non-failure path
    #[serde(default)]
    pub latency_max: u64,
}

/// Out-of-band HTTP call fired after the response is written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackSpec {
    /// Literal target URL (not templated)
    pub url: String,
    /// HTTP method, POST when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Callback request headers
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Callback request body, rendered as a template
    #[serde(default)]
    pub body: String,
}

/// How a response sequence behaves once exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceMode {
    /// Wrap around to the first item
    #[default]
    Cycle,
    /// Keep returning the last item
    Once,
}

/// One concrete response: the shape of a sequence element and of the
/// effective response handed to the synthesizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseItem {
    /// HTTP status code
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    /// Response headers
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Response body text
    #[serde(default)]
    pub body: String,
    /// Expand the body as a template
    #[serde(default)]
    pub template: bool,
    /// Expand header values as templates
    #[serde(default)]
    pub header_templates: bool,
    /// Fixed delay in milliseconds (overridden by `latency` when present)
    #[serde(default)]
    pub delay: u64,
    /// Richer latency model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySpec>,
    /// Fault injection gate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chaos: Option<ChaosSpec>,
    /// Post-response callback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackSpec>,
}

fn default_status_code() -> u16 {
    200
}

impl Default for ResponseItem {
    fn default() -> Self {
        Self {
            status_code: 200,
            headers: HashMap::new(),
            body: String::new(),
            template: false,
            header_templates: false,
            delay: 0,
            latency: None,
            chaos: None,
            callback: None,
        }
    }
}

/// Full response plan of a mock record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSpec {
    /// HTTP status code
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    /// Response headers
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Response body text
    #[serde(default)]
    pub body: String,
    /// Expand the body as a template
    #[serde(default)]
    pub template: bool,
    /// Expand header values as templates
    #[serde(default)]
    pub header_templates: bool,
    /// Fixed delay in milliseconds
    #[serde(default)]
    pub delay: u64,
    /// Richer latency model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySpec>,
    /// Fault injection gate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chaos: Option<ChaosSpec>,
    /// Stepped responses driven by the per-mock sequence cursor
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sequence: Vec<ResponseItem>,
    /// Exhaustion behavior of `sequence`
    #[serde(default)]
    pub sequence_mode: SequenceMode,
    /// Post-response callback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackSpec>,
}

impl Default for ResponseSpec {
    fn default() -> Self {
        Self {
            status_code: 200,
            headers: HashMap::new(),
            body: String::new(),
            template: false,
            header_templates: false,
            delay: 0,
            latency: None,
            chaos: None,
            sequence: Vec::new(),
            sequence_mode: SequenceMode::Cycle,
            callback: None,
        }
    }
}

impl ResponseSpec {
    /// The top-level response as a standalone item (used when no sequence
    /// element or dynamic override applies)
    pub fn primary(&self) -> ResponseItem {
        ResponseItem {
            status_code: self.status_code,
            headers: self.headers.clone(),
            body: self.body.clone(),
            template: self.template,
            header_templates: self.header_templates,
            delay: self.delay,
            latency: self.latency.clone(),
            chaos: self.chaos.clone(),
            callback: self.callback.clone(),
        }
    }
}

/// One scheduled WebSocket message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessageSpec {
    /// Text frame payload (may be a template)
    pub text: String,
    /// Delay before sending this message, milliseconds
    #[serde(default)]
    pub delay_ms: u64,
}

/// WebSocket connection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WsMode {
    /// Echo every text frame back verbatim
    #[default]
    Echo,
    /// Send the configured messages in order
    Sequence,
    /// Join a named fan-out channel
    Broadcast,
    /// Drive the connection from a script
    Javascript,
}

/// WebSocket behavior of a mock record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSocketSpec {
    /// Connection mode
    #[serde(default)]
    pub mode: WsMode,
    /// Messages for sequence mode
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<WsMessageSpec>,
    /// Message sent immediately after the upgrade
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_connect: Option<String>,
    /// Pause between sequence messages, milliseconds
    #[serde(default)]
    pub interval_ms: u64,
    /// Close after this many sent messages (0 = unbounded, sequence loops)
    #[serde(default)]
    pub close_after: usize,
    /// Fan-out channel name for broadcast mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Refuse upgrades beyond this many live connections (0 = unlimited)
    #[serde(default)]
    pub max_connections: usize,
    /// Script for javascript mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub javascript: Option<String>,
}

/// One Server-Sent Event to emit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SseEventSpec {
    /// `event:` field (omitted when empty)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// `id:` field (omitted when empty)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `retry:` field in milliseconds (omitted when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u64>,
    /// `data:` payload (may be a template)
    #[serde(default)]
    pub data: String,
    /// Delay before emitting this event, milliseconds
    #[serde(default)]
    pub delay_ms: u64,
}

/// SSE stream mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SseMode {
    /// Emit the event list once, then close
    #[default]
    Once,
    /// Restart the list when exhausted
    Cycle,
    /// Drive the stream from a script
    Javascript,
}

/// SSE behavior of a mock record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SseSpec {
    /// Stream mode
    #[serde(default)]
    pub mode: SseMode,
    /// Events for list modes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SseEventSpec>,
    /// Pause between events, milliseconds
    #[serde(default)]
    pub interval_ms: u64,
    /// Emit a `: keep-alive` comment this often, milliseconds (0 = off)
    #[serde(default)]
    pub keep_alive_ms: u64,
    /// Initial `retry:` advice sent before the first event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u64>,
    /// Close after this many emitted events (0 = unbounded)
    #[serde(default)]
    pub close_after: usize,
    /// Script for javascript mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub javascript: Option<String>,
}

/// A single matchable mock: predicate plus response plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockRecord {
    /// Identifier used in traces and sequence keying; first wins on ties
    pub name: String,
    /// Scenario tags; empty means member of every scenario
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenarios: Vec<String>,
    /// Higher matches first; ties broken by definition order
    #[serde(default)]
    pub priority: i32,
    /// Wire protocol of this record
    #[serde(default)]
    pub protocol: Protocol,
    /// Request conditions
    #[serde(default)]
    pub request: RequestPredicate,
    /// Response plan
    #[serde(default)]
    pub response: ResponseSpec,
    /// WebSocket behavior (protocol = websocket)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub websocket: Option<WebSocketSpec>,
    /// SSE behavior (protocol = sse)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sse: Option<SseSpec>,
}

impl MockRecord {
    /// Create a record with just a name; everything else defaulted
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scenarios: Vec::new(),
            priority: 0,
            protocol: Protocol::Http,
            request: RequestPredicate::default(),
            response: ResponseSpec::default(),
            websocket: None,
            sse: None,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Restrict to the given scenarios
    pub fn with_scenarios(mut self, scenarios: Vec<String>) -> Self {
        self.scenarios = scenarios;
        self
    }

    /// Whether this record is visible under the given active scenario.
    /// Untagged records belong to every scenario; an empty active scenario
    /// restricts nothing.
    pub fn in_scenario(&self, active: &str) -> bool {
        if self.scenarios.is_empty() || active.is_empty() {
            return true;
        }
        self.scenarios.iter().any(|s| s == active)
    }
}

/// Top-level catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockCatalog {
    /// Mock records in definition order
    #[serde(default)]
    pub mocks: Vec<MockRecord>,
}

impl MockCatalog {
    /// Parse a catalog from YAML text
    pub fn from_yaml(input: &str) -> Result<Self> {
        let catalog: Self = serde_yaml::from_str(input)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a catalog from JSON text
    pub fn from_json(input: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(input)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Serialize the catalog as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Serialize the catalog as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject catalogs that cannot possibly serve: bad regexes, bad
    /// schemas, mismatched protocol sections. Runs at startup and on
    /// every hot reload, before the swap.
    pub fn validate(&self) -> Result<()> {
        for (index, mock) in self.mocks.iter().enumerate() {
            let label = if mock.name.is_empty() {
                format!("mock #{}", index)
            } else {
                format!("mock '{}'", mock.name)
            };

            let pred = &mock.request;
            if pred.regex.uri {
                if let Some(pattern) = pred.uri.as_deref() {
                    regex::Regex::new(pattern).map_err(|e| {
                        Error::catalog(format!("{}: invalid uri regex: {}", label, e))
                    })?;
                }
            }
            if pred.regex.method {
                if let Some(pattern) = pred.method.as_deref() {
                    regex::Regex::new(pattern).map_err(|e| {
                        Error::catalog(format!("{}: invalid method regex: {}", label, e))
                    })?;
                }
            }
            if pred.regex.headers {
                for (key, value) in &pred.headers {
                    regex::Regex::new(key).map_err(|e| {
                        Error::catalog(format!("{}: invalid header name regex: {}", label, e))
                    })?;
                    regex::Regex::new(value).map_err(|e| {
                        Error::catalog(format!("{}: invalid header value regex: {}", label, e))
                    })?;
                }
            }
            if pred.regex.body {
                if let Some(pattern) = pred.body.as_deref() {
                    regex::Regex::new(pattern).map_err(|e| {
                        Error::catalog(format!("{}: invalid body regex: {}", label, e))
                    })?;
                }
            }
            for matcher in &pred.json_path {
                if matcher.regex {
                    if let Some(pattern) = matcher.value.as_str() {
                        regex::Regex::new(pattern).map_err(|e| {
                            Error::catalog(format!(
                                "{}: invalid json_path regex at '{}': {}",
                                label, matcher.path, e
                            ))
                        })?;
                    }
                }
            }
            if let Some(schema) = &pred.validate_schema {
                jsonschema::validator_for(schema).map_err(|e| {
                    Error::catalog(format!("{}: invalid json schema: {}", label, e))
                })?;
            }

            if let Some(chaos) = &mock.response.chaos {
                if !(0.0..=1.0).contains(&chaos.failure_rate) {
                    return Err(Error::catalog(format!(
                        "{}: chaos failure_rate must be within [0, 1]",
                        label
                    )));
                }
            }

            match mock.protocol {
                Protocol::Websocket if mock.websocket.is_none() => {
                    return Err(Error::catalog(format!(
                        "{}: protocol is websocket but no websocket section is present",
                        label
                    )));
                }
                Protocol::Sse if mock.sse.is_none() => {
                    return Err(Error::catalog(format!(
                        "{}: protocol is sse but no sse section is present",
                        label
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// All scenario tags referenced by the catalog, sorted and deduplicated
    pub fn scenarios(&self) -> Vec<String> {
        let mut tags: Vec<String> =
            self.mocks.iter().flat_map(|m| m.scenarios.iter().cloned()).collect();
        tags.sort();
        tags.dedup();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
mocks:
  - name: get-user
    priority: 10
    request:
      uri: /api/users/123
      method: GET
    response:
      status_code: 200
      body: '{"id": 123}'
  - name: any-user
    priority: 5
    request:
      uri: '^/api/users/\d+$'
      method: GET
      regex:
        uri: true
    response:
      status_code: 200
      body: '{"id": 0}'
"#;

    #[test]
    fn parses_yaml_catalog() {
        let catalog = MockCatalog::from_yaml(SAMPLE).unwrap();
        assert_eq!(catalog.mocks.len(), 2);
        assert_eq!(catalog.mocks[0].name, "get-user");
        assert_eq!(catalog.mocks[0].priority, 10);
        assert!(catalog.mocks[1].request.regex.uri);
        assert_eq!(catalog.mocks[0].protocol, Protocol::Http);
    }

    #[test]
    fn defaults_are_lenient() {
        let catalog = MockCatalog::from_yaml("mocks:\n  - name: bare\n").unwrap();
        let mock = &catalog.mocks[0];
        assert_eq!(mock.response.status_code, 200);
        assert!(mock.request.is_empty());
        assert_eq!(mock.response.sequence_mode, SequenceMode::Cycle);
    }

    #[test]
    fn rejects_bad_regex() {
        let bad = r#"
mocks:
  - name: broken
    request:
      uri: '([unclosed'
      regex:
        uri: true
"#;
        let err = MockCatalog::from_yaml(bad).unwrap_err();
        assert!(err.to_string().contains("invalid uri regex"));
    }

    #[test]
    fn rejects_missing_protocol_section() {
        let bad = r#"
mocks:
  - name: ws-no-spec
    protocol: websocket
"#;
        assert!(MockCatalog::from_yaml(bad).is_err());
    }

    #[test]
    fn rejects_out_of_range_failure_rate() {
        let bad = r#"
mocks:
  - name: too-chaotic
    response:
      chaos:
        enabled: true
        failure_rate: 1.5
"#;
        assert!(MockCatalog::from_yaml(bad).is_err());
    }

    #[test]
    fn scenario_membership() {
        let mock = MockRecord::new("m").with_scenarios(vec!["happy".into()]);
        assert!(mock.in_scenario("happy"));
        assert!(mock.in_scenario(""));
        assert!(!mock.in_scenario("sad"));

        let untagged = MockRecord::new("u");
        assert!(untagged.in_scenario("anything"));
    }

    #[test]
    fn scenario_listing_is_sorted_and_unique() {
        let yaml = r#"
mocks:
  - name: a
    scenarios: [two, one]
  - name: b
    scenarios: [one]
"#;
        let catalog = MockCatalog::from_yaml(yaml).unwrap();
        assert_eq!(catalog.scenarios(), vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn yaml_round_trip() {
        let catalog = MockCatalog::from_yaml(SAMPLE).unwrap();
        let yaml = catalog.to_yaml().unwrap();
        let reparsed = MockCatalog::from_yaml(&yaml).unwrap();
        assert_eq!(reparsed.mocks.len(), catalog.mocks.len());
        assert_eq!(reparsed.mocks[1].name, "any-user");
    }
}
