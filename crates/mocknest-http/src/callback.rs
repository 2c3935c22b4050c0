//! Fire-and-forget callbacks dispatched after a response is written
//!
//! Each callback runs on its own task with a 30 second timeout and never
//! holds a core lock across the network call. Failures are logged only.

use mocknest_core::templating::{self, RenderContext};
use mocknest_core::CallbackSpec;
use once_cell::sync::Lazy;
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::{debug, warn};

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("failed to build callback HTTP client")
});

/// Spawn the callback task. The URL is literal; the body is rendered as a
/// template against the originating request.
pub(crate) fn dispatch(spec: CallbackSpec, ctx: RenderContext) {
    tokio::spawn(async move {
        let method = spec
            .method
            .as_deref()
            .and_then(|m| Method::from_bytes(m.to_uppercase().as_bytes()).ok())
            .unwrap_or(Method::POST);

        let body = match templating::render(&spec.body, &ctx) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!("callback body template failed: {}; sending raw body", e);
                spec.body.clone()
            }
        };

        let mut request = CLIENT.request(method.clone(), &spec.url);
        for (key, value) in &spec.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        match request.body(body).send().await {
            Ok(response) => {
                debug!(
                    "callback {} {} completed with {}",
                    method,
                    spec.url,
                    response.status()
                );
            }
            Err(e) => {
                warn!("callback {} {} failed: {}", method, spec.url, e);
            }
        }
    });
}
