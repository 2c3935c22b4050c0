//! # Mocknest Core
//!
//! Core functionality and shared logic for the Mocknest mock server.
//!
//! This crate provides the building blocks used by every Mocknest
//! protocol (HTTP, WebSocket, SSE): the declarative mock catalog, the
//! priority-ordered request matcher, the embedded JavaScript host with
//! persistent cross-request state, template expansion, latency and chaos
//! models, traffic capture, and the upstream proxy forwarder.
//!
//! ## Quick Start: Matching Requests Against a Catalog
//!
//! ```rust,no_run
//! use mocknest_core::{
//!     Matcher, MockCatalog, MockStore, RequestContext, ScenarioState, ScriptHost,
//!     SequenceCursors,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> mocknest_core::Result<()> {
//!     let catalog = MockCatalog::from_yaml(
//!         "mocks:\n  - name: hello\n    request: {uri: /hello}\n    response: {body: world}\n",
//!     )?;
//!
//!     let cursors = Arc::new(SequenceCursors::new());
//!     let store = Arc::new(MockStore::new(catalog.mocks, cursors.clone()));
//!     let matcher = Matcher::new(
//!         store,
//!         Arc::new(ScenarioState::new()),
//!         cursors,
//!         Arc::new(ScriptHost::new()),
//!     );
//!
//!     let request = RequestContext {
//!         method: "GET".to_string(),
//!         path: "/hello".to_string(),
//!         ..Default::default()
//!     };
//!     if let Some(hit) = matcher.find(&request).await {
//!         println!("{}", hit.response.body);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Key Modules
//!
//! - [`catalog`]: the declarative mock data model and its YAML/JSON forms
//! - [`store`]: atomically swappable priority-sorted catalog snapshots
//! - [`matcher`]: request-to-mock resolution
//! - [`script`]: the persistent QuickJS host behind match/stream scripts
//! - [`templating`]: `{{token}}` expansion for bodies, headers, callbacks
//! - [`latency`]: latency sampling and the chaos fault gate
//! - [`recorder`] / [`tracer`]: traffic capture and the dashboard trace
//! - [`proxy`]: upstream forwarding for unmatched requests

pub mod catalog;
pub mod config;
pub mod error;
pub mod json_path;
pub mod latency;
pub mod matcher;
pub mod proxy;
pub mod recorder;
pub mod scenario;
pub mod script;
pub mod sequence;
pub mod store;
pub mod templating;
pub mod tracer;

pub use catalog::{
    CallbackSpec, ChaosSpec, JsonPathMatcher, LatencyMode, LatencySpec, MockCatalog, MockRecord,
    Protocol, RegexFlags, RequestPredicate, ResponseItem, ResponseSpec, SequenceMode, SseEventSpec,
    SseMode, SseSpec, WebSocketSpec, WsMessageSpec, WsMode,
};
pub use config::{ServerConfig, TlsConfig};
pub use error::{Error, Result};
pub use matcher::{effective_response, predicate_matches, MatchOutcome, Matcher, RequestContext};
pub use proxy::{ForwardedResponse, ProxyForwarder};
pub use recorder::{RecordedExchange, Recorder};
pub use scenario::ScenarioState;
pub use script::{MatchVerdict, ScriptHost, StreamAction};
pub use sequence::SequenceCursors;
pub use store::MockStore;
pub use templating::{register_word_provider, RenderContext, WordProvider};
pub use tracer::{RequestTrace, Tracer};
