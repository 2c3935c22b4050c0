//! Upstream forwarding for unmatched requests
//!
//! When forwarding is enabled, requests no mock accepts are relayed to the
//! configured upstream: same method, path, query, headers and body, plus
//! `X-Forwarded-*`. Redirects are not followed; status, headers and body
//! come back verbatim. A transport failure maps to 502 at the call site.

use crate::matcher::RequestContext;
use crate::{Error, Result};
use reqwest::{redirect, Client, Method};
use std::time::Duration;

/// Hop-by-hop headers never copied toward the upstream
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "host",
    "content-length",
];

/// Response relayed from the upstream
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    /// Upstream status code
    pub status: u16,
    /// Upstream headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Upstream body bytes
    pub body: Vec<u8>,
}

/// Forwarder bound to one upstream base URL
pub struct ProxyForwarder {
    upstream: String,
    client: Client,
}

impl ProxyForwarder {
    /// Create a forwarder. `upstream` is a base URL such as
    /// `http://localhost:9090`; trailing slashes are trimmed.
    pub fn new(upstream: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::proxy(format!("failed to build upstream client: {}", e)))?;
        Ok(Self {
            upstream: upstream.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// The configured upstream base URL
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Relay `req` to the upstream and return its response verbatim
    pub async fn forward(&self, req: &RequestContext) -> Result<ForwardedResponse> {
        let mut url = format!("{}{}", self.upstream, req.path);
        if !req.query.is_empty() {
            url.push('?');
            url.push_str(&req.query);
        }

        let method = Method::from_bytes(req.method.as_bytes())
            .map_err(|_| Error::proxy(format!("invalid method '{}'", req.method)))?;

        let mut builder = self.client.request(method, &url);
        for (key, value) in &req.headers {
            if HOP_BY_HOP.contains(&key.to_lowercase().as_str()) {
                continue;
            }
            builder = builder.header(key.as_str(), value.as_str());
        }

        let client_ip = req
            .remote_addr
            .rsplit_once(':')
            .map(|(ip, _)| ip.to_string())
            .unwrap_or_else(|| req.remote_addr.clone());
        builder = builder.header("x-forwarded-for", client_ip);
        builder = builder.header("x-forwarded-proto", "http");
        if let Some(host) = req.header_first("host") {
            builder = builder.header("x-forwarded-host", host);
        }

        if !req.body.is_empty() {
            builder = builder.body(req.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::proxy(format!("upstream request failed: {}", e)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (key.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::proxy(format!("failed to read upstream body: {}", e)))?
            .to_vec();

        Ok(ForwardedResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let forwarder = ProxyForwarder::new("http://localhost:9090/").unwrap();
        assert_eq!(forwarder.upstream(), "http://localhost:9090");
    }

    #[tokio::test]
    async fn transport_error_is_a_proxy_error() {
        // Port 9 (discard) is not listening in the test environment.
        let forwarder = ProxyForwarder::new("http://127.0.0.1:9").unwrap();
        let req = RequestContext {
            method: "GET".to_string(),
            path: "/x".to_string(),
            ..Default::default()
        };
        let err = forwarder.forward(&req).await.unwrap_err();
        assert!(matches!(err, Error::Proxy { .. }));
    }
}
