//! # Mocknest HTTP
//!
//! The HTTP face of Mocknest: the intake pipeline (buffer body → match →
//! dispatch by protocol), the response synthesizer (chaos → latency →
//! headers → body → callbacks), SSE streaming, proxy fallback, and the
//! runtime control plane under the reserved `/__*` prefix.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mocknest_core::{MockCatalog, ServerConfig};
//! use mocknest_http::{serve, AppState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let catalog = MockCatalog::from_yaml(
//!         "mocks:\n  - name: hello\n    request: {uri: /hello}\n    response: {body: world}\n",
//!     )?;
//!     let state = AppState::new(catalog.mocks, 1000);
//!     let config = ServerConfig {
//!         port: 8080,
//!         ..Default::default()
//!     };
//!     serve(&config, state).await
//! }
//! ```

mod callback;
mod control;
mod handler;
mod server;
mod sse;
mod state;
mod synthesizer;
mod tls;

pub use server::{build_router, serve};
pub use state::{AppState, ReloadFn};
pub use tls::validate as validate_tls;
