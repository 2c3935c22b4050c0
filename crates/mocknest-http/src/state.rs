//! Shared server state

use mocknest_core::{
    Matcher, MockRecord, MockStore, ProxyForwarder, Recorder, ScenarioState, ScriptHost,
    SequenceCursors, Tracer,
};
use mocknest_ws::{BroadcastHub, ConnectionGauge};
use std::sync::Arc;

/// Hook invoked by `POST /__reload`; returns the new record count
pub type ReloadFn = Arc<dyn Fn() -> mocknest_core::Result<usize> + Send + Sync>;

/// Everything the request handlers share
#[derive(Clone)]
pub struct AppState {
    /// Mock catalog snapshots
    pub store: Arc<MockStore>,
    /// Active scenario tag
    pub scenario: Arc<ScenarioState>,
    /// Per-mock sequence cursors
    pub cursors: Arc<SequenceCursors>,
    /// JavaScript host
    pub scripts: Arc<ScriptHost>,
    /// Request matcher over the above
    pub matcher: Arc<Matcher>,
    /// Traffic capture
    pub recorder: Arc<Recorder>,
    /// Dashboard trace ring
    pub tracer: Arc<Tracer>,
    /// Upstream forwarder for unmatched requests
    pub proxy: Option<Arc<ProxyForwarder>>,
    /// WebSocket fan-out channels
    pub hub: Arc<BroadcastHub>,
    /// WebSocket connection caps
    pub gauge: Arc<ConnectionGauge>,
    /// Catalog reload hook registered by the binary
    pub reload: Option<ReloadFn>,
}

impl AppState {
    /// Assemble fresh state over the given records
    pub fn new(records: Vec<MockRecord>, trace_limit: usize) -> Self {
        let cursors = Arc::new(SequenceCursors::new());
        let store = Arc::new(MockStore::new(records, cursors.clone()));
        let scenario = Arc::new(ScenarioState::new());
        let scripts = Arc::new(ScriptHost::new());
        let matcher = Arc::new(Matcher::new(
            store.clone(),
            scenario.clone(),
            cursors.clone(),
            scripts.clone(),
        ));
        Self {
            store,
            scenario,
            cursors,
            scripts,
            matcher,
            recorder: Arc::new(Recorder::new()),
            tracer: Arc::new(Tracer::new(trace_limit)),
            proxy: None,
            hub: Arc::new(BroadcastHub::new()),
            gauge: Arc::new(ConnectionGauge::new()),
            reload: None,
        }
    }

    /// Enable proxy fallback toward `upstream`
    pub fn with_proxy(mut self, upstream: ProxyForwarder) -> Self {
        self.proxy = Some(Arc::new(upstream));
        self
    }

    /// Register the hot-reload hook
    pub fn with_reload(mut self, reload: ReloadFn) -> Self {
        self.reload = Some(reload);
        self
    }

    /// Set the scenario active at startup
    pub fn with_initial_scenario(self, tag: &str) -> Self {
        self.scenario.set(tag);
        self
    }
}
