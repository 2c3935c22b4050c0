//! End-to-end tests for scripted matching and persistent global state

mod common;

use common::{spawn_server, url};

const SCRIPTED_CATALOG: &str = r#"
mocks:
  - name: create-user
    request:
      javascript: |
        (function () {
          if (request.method !== 'POST' || request.path !== '/api/users') {
            return {matches: false};
          }
          var user = JSON.parse(request.body);
          global.users = global.users || [];
          global.users.push(user.name);
          return {matches: true, response: {status_code: 201, body: 'stored'}};
        })()
  - name: list-users
    request:
      javascript: |
        (function () {
          if (request.method !== 'GET' || request.path !== '/api/users') {
            return {matches: false};
          }
          return {
            matches: true,
            response: {
              status_code: 200,
              headers: {'content-type': 'application/json'},
              body: JSON.stringify(global.users || [])
            }
          };
        })()
"#;

#[tokio::test]
async fn script_state_is_visible_across_requests() {
    let (addr, _state) = spawn_server(SCRIPTED_CATALOG).await;
    let client = reqwest::Client::new();

    let response = client
        .post(url(addr, "/api/users"))
        .body(r#"{"name":"John"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let body = client
        .get(url(addr, "/api/users"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("John"));
}

#[tokio::test]
async fn catalog_swap_preserves_global_but_resets_cursors() {
    let (addr, state) = spawn_server(SCRIPTED_CATALOG).await;
    let client = reqwest::Client::new();

    client
        .post(url(addr, "/api/users"))
        .body(r#"{"name":"John"}"#)
        .send()
        .await
        .unwrap();

    // Hot reload with the same catalog: cursors reset, script state stays.
    let catalog = mocknest_core::MockCatalog::from_yaml(SCRIPTED_CATALOG).unwrap();
    state.store.swap(catalog.mocks);
    assert_eq!(state.cursors.peek("create-user"), 0);

    let body = client
        .get(url(addr, "/api/users"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("John"));
}

#[tokio::test]
async fn throwing_script_falls_through_to_next_mock() {
    let (addr, _state) = spawn_server(
        r#"
mocks:
  - name: broken
    priority: 10
    request:
      javascript: "throw new Error('kaboom')"
    response: {body: never}
  - name: fallback
    request: {uri: /api/thing}
    response: {body: fallback}
"#,
    )
    .await;

    let body = reqwest::get(url(addr, "/api/thing"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "fallback");
}

#[tokio::test]
async fn dynamic_response_still_advances_the_sequence_cursor() {
    let (addr, state) = spawn_server(
        r#"
mocks:
  - name: scripted
    request:
      javascript: "({matches: request.path === '/api/dyn', response: {status_code: 200, body: 'dynamic'}})"
    response:
      sequence:
        - {body: a}
        - {body: b}
"#,
    )
    .await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let body = client
            .get(url(addr, "/api/dyn"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "dynamic");
    }
    assert_eq!(state.cursors.peek("scripted"), 3);
}
