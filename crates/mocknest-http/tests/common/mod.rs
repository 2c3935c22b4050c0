//! Shared harness for end-to-end tests

use mocknest_core::MockCatalog;
use mocknest_http::{build_router, AppState};
use std::net::SocketAddr;

/// Boot a server over the given catalog on an ephemeral port
pub async fn spawn_server(yaml: &str) -> (SocketAddr, AppState) {
    let catalog = MockCatalog::from_yaml(yaml).expect("catalog should parse");
    let state = AppState::new(catalog.mocks, 100);
    spawn_with_state(state).await
}

/// Boot a server over prepared state on an ephemeral port
pub async fn spawn_with_state(state: AppState) -> (SocketAddr, AppState) {
    let router = build_router(state.clone(), false);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("ephemeral bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("server runs");
    });
    (addr, state)
}

/// Base URL for a spawned server
pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}
