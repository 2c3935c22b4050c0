//! Router assembly and serving

use crate::state::AppState;
use crate::{control, handler, tls};
use axum::routing::{get, post};
use axum::Router;
use mocknest_core::ServerConfig;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Build the full router: control plane first, catch-all matcher behind it
pub fn build_router(state: AppState, cors_enabled: bool) -> Router {
    let router = Router::new()
        .nest("/__recording", control::recording_router())
        .nest("/__scenario", control::scenario_router())
        .nest("/__traces", control::traces_router())
        .nest("/__ws", control::ws_router())
        .route("/__reload", post(control::reload))
        .route("/__health", get(control::health))
        .fallback(handler::handle_any)
        .with_state(state);

    if cors_enabled {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Bind and serve until the process ends. Bind failures and invalid TLS
/// material surface as errors so the binary can exit non-zero.
pub async fn serve(
    config: &ServerConfig,
    state: AppState,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(tls_config) = &config.tls {
        tls::validate(tls_config)?;
        warn!(
            "TLS material validated; termination is expected at a fronting proxy, listening on plain HTTP"
        );
    }

    let app = build_router(state, config.cors_enabled);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        format!(
            "failed to bind to port {}: {} (is another process using it?)",
            config.port, e
        )
    })?;

    info!("mocknest listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
