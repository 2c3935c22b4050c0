//! Server configuration consumed by the binary

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// TLS material locations. Loading is validated at startup; termination
/// itself is expected to happen at a fronting proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM certificate chain
    pub cert_file: PathBuf,
    /// PEM PKCS#8 private key
    pub key_file: PathBuf,
}

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening TCP port
    pub port: u16,
    /// Mock catalog file or directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mocks_path: Option<PathBuf>,
    /// Upstream base URL; enables proxy fallback when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_target: Option<String>,
    /// Permissive CORS layer
    pub cors_enabled: bool,
    /// TLS material to validate at startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// Scenario active at startup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_scenario: Option<String>,
    /// Trace ring capacity
    pub trace_limit: usize,
    /// Watch the catalog path and hot reload on change
    pub watch: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            mocks_path: None,
            proxy_target: None,
            cors_enabled: false,
            tls: None,
            initial_scenario: None,
            trace_limit: 1000,
            watch: false,
        }
    }
}
