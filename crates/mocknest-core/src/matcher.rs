//! Request-to-mock resolution
//!
//! Walks the store snapshot in priority order applying the scenario filter
//! and each record's predicate (or matcher script), advances the sequence
//! cursor exactly once per hit, and computes the effective response. All
//! predicate evaluation errors demote to "this record does not match";
//! they never abort the walk.

use crate::catalog::{MockRecord, RequestPredicate, ResponseItem, SequenceMode};
use crate::json_path;
use crate::scenario::ScenarioState;
use crate::script::ScriptHost;
use crate::sequence::SequenceCursors;
use crate::store::MockStore;
use crate::templating::RenderContext;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Buffered view of one incoming request, shared by the matcher, the
/// template renderer and the recorder
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// HTTP method, uppercased by the intake layer
    pub method: String,
    /// Full request target (path plus query)
    pub uri: String,
    /// Path component only
    pub path: String,
    /// Raw query string without the leading `?`
    pub query: String,
    /// All header pairs in arrival order
    pub headers: Vec<(String, String)>,
    /// Buffered body text
    pub body: String,
    /// Peer address
    pub remote_addr: String,
}

impl RequestContext {
    /// First header value for `name`, case-insensitive
    pub fn header_first(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// View for the template renderer
    pub fn render_context(&self) -> RenderContext {
        RenderContext {
            method: self.method.clone(),
            uri: self.uri.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
            body: self.body.clone(),
            remote_addr: self.remote_addr.clone(),
            headers: self.headers.clone(),
        }
    }

    /// The `request` object bound into script evaluations: first header
    /// value per key, lowercased names
    pub fn script_value(&self) -> Value {
        let mut headers = serde_json::Map::new();
        for (key, value) in &self.headers {
            let key = key.to_lowercase();
            headers
                .entry(key)
                .or_insert_with(|| Value::String(value.clone()));
        }
        json!({
            "uri": self.uri,
            "method": self.method,
            "path": self.path,
            "headers": headers,
            "body": self.body,
        })
    }
}

/// A successful match: the winning record and the response to synthesize
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// The matched record (cloned out of the snapshot)
    pub record: MockRecord,
    /// Effective response after sequence/script resolution
    pub response: ResponseItem,
}

/// Priority-ordered request matcher over the mock store
pub struct Matcher {
    store: Arc<MockStore>,
    scenario: Arc<ScenarioState>,
    cursors: Arc<SequenceCursors>,
    scripts: Arc<ScriptHost>,
}

impl Matcher {
    /// Create a matcher over the given shared state
    pub fn new(
        store: Arc<MockStore>,
        scenario: Arc<ScenarioState>,
        cursors: Arc<SequenceCursors>,
        scripts: Arc<ScriptHost>,
    ) -> Self {
        Self {
            store,
            scenario,
            cursors,
            scripts,
        }
    }

    /// Find the first record accepting `req` and resolve its response.
    /// Deterministic for identical inputs modulo cursor and script state.
    pub async fn find(&self, req: &RequestContext) -> Option<MatchOutcome> {
        let snapshot = self.store.snapshot();
        let active = self.scenario.active();

        for record in snapshot.iter() {
            if !record.in_scenario(&active) {
                continue;
            }

            let dynamic = if let Some(script) = record.request.javascript.as_deref() {
                match self.scripts.eval_match(script, req.script_value()).await {
                    Ok(verdict) if verdict.matches => verdict.response,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(mock = %record.name, "matcher script failed: {}", e);
                        continue;
                    }
                }
            } else {
                if !predicate_matches(&record.request, req) {
                    continue;
                }
                None
            };

            let cursor = self.cursors.advance(&record.name);
            let response = effective_response(record, cursor, dynamic);
            debug!(mock = %record.name, cursor, "matched request {} {}", req.method, req.path);
            return Some(MatchOutcome {
                record: record.clone(),
                response,
            });
        }
        None
    }
}

/// Evaluate the static predicate chain, short-circuiting on the first
/// failing sub-predicate: URI → method → headers → body → json_path →
/// json schema.
pub fn predicate_matches(pred: &RequestPredicate, req: &RequestContext) -> bool {
    if let Some(pattern) = pred.uri.as_deref().filter(|p| !p.is_empty()) {
        let hit = if pred.regex.uri {
            match Regex::new(pattern) {
                Ok(re) => re.is_match(&req.path),
                Err(e) => {
                    warn!("uri regex '{}' failed to compile: {}", pattern, e);
                    false
                }
            }
        } else {
            pattern == req.path
        };
        if !hit {
            return false;
        }
    }

    if let Some(pattern) = pred.method.as_deref().filter(|p| !p.is_empty()) {
        let hit = if pred.regex.method {
            match Regex::new(pattern) {
                Ok(re) => re.is_match(&req.method),
                Err(e) => {
                    warn!("method regex '{}' failed to compile: {}", pattern, e);
                    false
                }
            }
        } else {
            pattern.eq_ignore_ascii_case(&req.method)
        };
        if !hit {
            return false;
        }
    }

    for (name, expected) in &pred.headers {
        let hit = if pred.regex.headers {
            // Regex mode is case-sensitive on names and values unless the
            // pattern itself opts in with (?i).
            match (Regex::new(name), Regex::new(expected)) {
                (Ok(name_re), Ok(value_re)) => req
                    .headers
                    .iter()
                    .any(|(k, v)| name_re.is_match(k) && value_re.is_match(v)),
                _ => {
                    warn!("header regex for '{}' failed to compile", name);
                    false
                }
            }
        } else {
            req.headers
                .iter()
                .any(|(k, v)| k.eq_ignore_ascii_case(name) && v.eq_ignore_ascii_case(expected))
        };
        if !hit {
            return false;
        }
    }

    if let Some(pattern) = pred.body.as_deref() {
        let hit = if pred.regex.body {
            match Regex::new(pattern) {
                Ok(re) => re.is_match(&req.body),
                Err(e) => {
                    warn!("body regex failed to compile: {}", e);
                    false
                }
            }
        } else {
            pattern == req.body
        };
        if !hit {
            return false;
        }
    }

    if !pred.json_path.is_empty() {
        let parsed: Value = match serde_json::from_str(&req.body) {
            Ok(value) => value,
            Err(_) => return false,
        };
        for matcher in &pred.json_path {
            let actual = match json_path::lookup(&parsed, &matcher.path) {
                Some(value) => value,
                None => return false,
            };
            let actual_text = json_path::value_to_string(actual);
            let hit = if matcher.regex {
                match matcher.value.as_str().map(Regex::new) {
                    Some(Ok(re)) => re.is_match(&actual_text),
                    _ => false,
                }
            } else {
                actual == &matcher.value
                    || actual_text == json_path::value_to_string(&matcher.value)
            };
            if !hit {
                return false;
            }
        }
    }

    if let Some(schema) = &pred.validate_schema {
        let parsed: Value = match serde_json::from_str(&req.body) {
            Ok(value) => value,
            Err(_) => return false,
        };
        match jsonschema::validator_for(schema) {
            Ok(validator) => {
                if !validator.is_valid(&parsed) {
                    return false;
                }
            }
            Err(e) => {
                warn!("json schema failed to compile: {}", e);
                return false;
            }
        }
    }

    true
}

/// Pure resolution of the response to serve for a given cursor value.
/// All mutation (cursor advance, tracing, recording) happens elsewhere.
pub fn effective_response(
    record: &MockRecord,
    cursor: u64,
    dynamic: Option<ResponseItem>,
) -> ResponseItem {
    if let Some(item) = dynamic {
        return item;
    }
    let spec = &record.response;
    if !spec.sequence.is_empty() {
        let len = spec.sequence.len() as u64;
        let index = match spec.sequence_mode {
            SequenceMode::Cycle => (cursor % len) as usize,
            SequenceMode::Once => cursor.min(len - 1) as usize,
        };
        return spec.sequence[index].clone();
    }
    spec.primary()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{JsonPathMatcher, MockCatalog, ResponseSpec};

    fn request(method: &str, path: &str) -> RequestContext {
        RequestContext {
            method: method.to_string(),
            uri: path.to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn matcher_over(yaml: &str) -> Matcher {
        let catalog = MockCatalog::from_yaml(yaml).unwrap();
        let cursors = Arc::new(SequenceCursors::new());
        let store = Arc::new(MockStore::new(catalog.mocks, cursors.clone()));
        Matcher::new(
            store,
            Arc::new(ScenarioState::new()),
            cursors,
            Arc::new(ScriptHost::new()),
        )
    }

    #[test]
    fn empty_predicate_matches_anything() {
        let pred = RequestPredicate::default();
        assert!(predicate_matches(&pred, &request("GET", "/whatever")));
        assert!(predicate_matches(&pred, &request("DELETE", "/")));
    }

    #[test]
    fn uri_is_matched_against_path_only() {
        let pred = RequestPredicate {
            uri: Some("/api/users".to_string()),
            ..Default::default()
        };
        let mut req = request("GET", "/api/users");
        req.uri = "/api/users?page=2".to_string();
        req.query = "page=2".to_string();
        assert!(predicate_matches(&pred, &req));
    }

    #[test]
    fn method_is_case_insensitive() {
        let pred = RequestPredicate {
            method: Some("get".to_string()),
            ..Default::default()
        };
        assert!(predicate_matches(&pred, &request("GET", "/x")));
        assert!(!predicate_matches(&pred, &request("POST", "/x")));
    }

    #[test]
    fn header_exact_is_case_insensitive_on_name_and_value() {
        let pred = RequestPredicate {
            headers: [("X-Token".to_string(), "Secret".to_string())].into(),
            ..Default::default()
        };
        let mut req = request("GET", "/x");
        req.headers = vec![("x-token".to_string(), "SECRET".to_string())];
        assert!(predicate_matches(&pred, &req));

        req.headers = vec![("x-token".to_string(), "other".to_string())];
        assert!(!predicate_matches(&pred, &req));
    }

    #[test]
    fn header_regex_is_case_sensitive_by_default() {
        let pred = RequestPredicate {
            headers: [("^x-trace-.*$".to_string(), "^abc".to_string())].into(),
            regex: crate::catalog::RegexFlags {
                headers: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut req = request("GET", "/x");
        req.headers = vec![("x-trace-id".to_string(), "abc123".to_string())];
        assert!(predicate_matches(&pred, &req));

        // Uppercase name no longer matches the lowercase pattern.
        req.headers = vec![("X-Trace-Id".to_string(), "abc123".to_string())];
        assert!(!predicate_matches(&pred, &req));

        // Unless the pattern opts in.
        let pred = RequestPredicate {
            headers: [("(?i)^x-trace-.*$".to_string(), "^abc".to_string())].into(),
            regex: crate::catalog::RegexFlags {
                headers: true,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(predicate_matches(&pred, &req));
    }

    #[test]
    fn json_path_predicates() {
        let pred = RequestPredicate {
            json_path: vec![
                JsonPathMatcher {
                    path: "$.user.name".to_string(),
                    value: serde_json::json!("John"),
                    regex: false,
                },
                JsonPathMatcher {
                    path: "$.user.age".to_string(),
                    value: serde_json::json!("4\\d"),
                    regex: true,
                },
            ],
            ..Default::default()
        };
        let mut req = request("POST", "/x");
        req.body = r#"{"user":{"name":"John","age":42}}"#.to_string();
        assert!(predicate_matches(&pred, &req));

        req.body = r#"{"user":{"name":"John","age":30}}"#.to_string();
        assert!(!predicate_matches(&pred, &req));

        req.body = "not json".to_string();
        assert!(!predicate_matches(&pred, &req));
    }

    #[test]
    fn schema_validation_predicate() {
        let pred = RequestPredicate {
            validate_schema: Some(serde_json::json!({
                "type": "object",
                "required": ["name"],
                "properties": {"name": {"type": "string"}}
            })),
            ..Default::default()
        };
        let mut req = request("POST", "/x");
        req.body = r#"{"name":"ok"}"#.to_string();
        assert!(predicate_matches(&pred, &req));

        req.body = r#"{"name":7}"#.to_string();
        assert!(!predicate_matches(&pred, &req));
    }

    #[tokio::test]
    async fn priority_then_definition_order() {
        let matcher = matcher_over(
            r#"
mocks:
  - name: exact
    priority: 10
    request: {uri: /api/users/123, method: GET}
    response: {body: exact}
  - name: pattern
    priority: 5
    request:
      uri: '^/api/users/\d+$'
      method: GET
      regex: {uri: true}
    response: {body: pattern}
"#,
        );
        let hit = matcher.find(&request("GET", "/api/users/123")).await.unwrap();
        assert_eq!(hit.record.name, "exact");

        let hit = matcher.find(&request("GET", "/api/users/999")).await.unwrap();
        assert_eq!(hit.record.name, "pattern");

        assert!(matcher.find(&request("GET", "/api/users/abc")).await.is_none());
    }

    #[tokio::test]
    async fn scenario_filter_limits_candidates() {
        let catalog = MockCatalog::from_yaml(
            r#"
mocks:
  - name: happy
    scenarios: [happy_path]
    request: {uri: /api/test}
    response: {status_code: 200, body: success}
  - name: sad
    scenarios: [error_state]
    request: {uri: /api/test}
    response: {status_code: 500, body: error}
  - name: fallback
    request: {uri: /api/test}
    response: {status_code: 200, body: fallback}
"#,
        )
        .unwrap();
        let cursors = Arc::new(SequenceCursors::new());
        let store = Arc::new(MockStore::new(catalog.mocks, cursors.clone()));
        let scenario = Arc::new(ScenarioState::new());
        let matcher = Matcher::new(
            store,
            scenario.clone(),
            cursors,
            Arc::new(ScriptHost::new()),
        );

        scenario.set("happy_path");
        let hit = matcher.find(&request("GET", "/api/test")).await.unwrap();
        assert_eq!(hit.response.body, "success");

        scenario.set("error_state");
        let hit = matcher.find(&request("GET", "/api/test")).await.unwrap();
        assert_eq!(hit.response.status_code, 500);

        scenario.clear();
        let hit = matcher.find(&request("GET", "/api/test")).await.unwrap();
        assert_eq!(hit.record.name, "happy");
    }

    #[tokio::test]
    async fn sequence_cycle_steps_per_match() {
        let matcher = matcher_over(
            r#"
mocks:
  - name: stepped
    request: {uri: /api/test}
    response:
      sequence:
        - {body: first}
        - {body: second}
        - {body: third}
      sequence_mode: cycle
"#,
        );
        let mut bodies = Vec::new();
        for _ in 0..4 {
            bodies.push(matcher.find(&request("GET", "/api/test")).await.unwrap().response.body);
        }
        assert_eq!(bodies, vec!["first", "second", "third", "first"]);
    }

    #[tokio::test]
    async fn sequence_once_saturates() {
        let matcher = matcher_over(
            r#"
mocks:
  - name: saturating
    request: {uri: /api/test}
    response:
      sequence:
        - {body: a}
        - {body: b}
      sequence_mode: once
"#,
        );
        let mut bodies = Vec::new();
        for _ in 0..4 {
            bodies.push(matcher.find(&request("GET", "/api/test")).await.unwrap().response.body);
        }
        assert_eq!(bodies, vec!["a", "b", "b", "b"]);
    }

    #[tokio::test]
    async fn script_match_advances_sequence_too() {
        let catalog = MockCatalog::from_yaml(
            r#"
mocks:
  - name: scripted
    request:
      javascript: "({matches: request.path === '/api/js'})"
    response: {body: static}
"#,
        )
        .unwrap();
        let cursors = Arc::new(SequenceCursors::new());
        let store = Arc::new(MockStore::new(catalog.mocks, cursors.clone()));
        let matcher = Matcher::new(
            store,
            Arc::new(ScenarioState::new()),
            cursors.clone(),
            Arc::new(ScriptHost::new()),
        );

        assert!(matcher.find(&request("GET", "/api/js")).await.is_some());
        assert!(matcher.find(&request("GET", "/api/other")).await.is_none());
        // One hit, one miss: cursor advanced exactly once.
        assert_eq!(cursors.peek("scripted"), 1);
    }

    #[tokio::test]
    async fn script_error_is_a_non_match() {
        let matcher = matcher_over(
            r#"
mocks:
  - name: broken
    priority: 10
    request:
      javascript: "throw new Error('nope')"
    response: {body: never}
  - name: safety-net
    request: {uri: /api/js}
    response: {body: caught}
"#,
        );
        let hit = matcher.find(&request("GET", "/api/js")).await.unwrap();
        assert_eq!(hit.record.name, "safety-net");
    }

    #[test]
    fn effective_response_prefers_dynamic() {
        let record = MockRecord {
            response: ResponseSpec {
                body: "static".to_string(),
                ..Default::default()
            },
            ..MockRecord::new("m")
        };
        let dynamic = ResponseItem {
            body: "dynamic".to_string(),
            ..Default::default()
        };
        assert_eq!(effective_response(&record, 3, Some(dynamic)).body, "dynamic");
        assert_eq!(effective_response(&record, 3, None).body, "static");
    }
}
