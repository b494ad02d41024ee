//! HTTP Integration Tests
//!
//! End-to-end coverage of the HTTP surface: a real server on a random port,
//! real script files on disk, and a plain reqwest client.
//!
//! Test Scenarios:
//! 1. Query-string invocation with literal-default coercion
//! 2. JSON body invocation
//! 3. Trusted username override (spoofing loses)
//! 4. Authentication gate and the debug bypass
//! 5. Permission hook denial and approval
//! 6. Accept-header negotiation
//! 7. Script failures map to 500 with a typed payload
//! 8. /whoami identity echo
//! 9. Unit reload after file edits
//! 10. Unknown routes and catch-all parameters

use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE, WWW_AUTHENTICATE};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use webscript_server::{PermissionHook, ServerConfig, WebscriptServer};

// ============================================================================
// Test Helpers
// ============================================================================

fn write_script(root: &TempDir, relative: &str, source: &str) {
    let path = root.path().join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, source).unwrap();
}

/// Starts a server over `root` on a random port and returns its address.
async fn start_server(root: &TempDir, debug: bool, hook: Option<PermissionHook>) -> SocketAddr {
    let config = ServerConfig::new(root.path()).with_debug(debug);
    let mut server = WebscriptServer::new(config);
    if let Some(hook) = hook {
        server = server.with_permission_hook(hook);
    }
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });
    addr
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

// ============================================================================
// Scenario 1: Query-string invocation with coercion
// ============================================================================

#[tokio::test]
async fn test_query_invocation_coerces_by_default_literals() {
    let root = TempDir::new().unwrap();
    write_script(
        &root,
        "apps/calc.js",
        "function add(a = 0, b = 0) { return a + b; }",
    );
    let addr = start_server(&root, true, None).await;

    let response = reqwest::get(url(addr, "/scripts/demo/apps/calc.add?a=5&b=7"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    let value: Value = response.json().await.unwrap();
    assert_eq!(value, json!(12));
}

// ============================================================================
// Scenario 2: JSON body invocation
// ============================================================================

#[tokio::test]
async fn test_json_body_invocation() {
    let root = TempDir::new().unwrap();
    write_script(
        &root,
        "apps/greet.js",
        "function greet(name) { return 'hello ' + name; }",
    );
    let addr = start_server(&root, true, None).await;

    let value: Value = reqwest::Client::new()
        .post(url(addr, "/scripts/demo/apps/greet.greet"))
        .json(&json!({"name": "ada"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(value, json!("hello ada"));
}

// ============================================================================
// Scenario 3: Trusted username override
// ============================================================================

#[tokio::test]
async fn test_username_override_defeats_spoofing() {
    let root = TempDir::new().unwrap();
    write_script(
        &root,
        "apps/who.js",
        "function who(actual_username = null) { return actual_username; }",
    );
    let addr = start_server(&root, false, None).await;

    // the caller tries to claim another identity in both the query and body
    let value: Value = reqwest::Client::new()
        .post(url(
            addr,
            "/scripts/demo/apps/who.who?actual_username=mallory",
        ))
        .basic_auth("alice", Some("pw"))
        .json(&json!({"actual_username": "mallory"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(value, json!("alice"));
}

// ============================================================================
// Scenario 4: Authentication gate and debug bypass
// ============================================================================

#[tokio::test]
async fn test_anonymous_request_is_unauthorized() {
    let root = TempDir::new().unwrap();
    write_script(&root, "apps/open.js", "function f() { return 1; }");
    let addr = start_server(&root, false, None).await;

    let response = reqwest::get(url(addr, "/scripts/demo/apps/open.f"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    assert!(response.headers().contains_key(WWW_AUTHENTICATE));
    let payload: Value = response.json().await.unwrap();
    assert_eq!(payload["error"], json!("AuthenticationError"));
}

#[tokio::test]
async fn test_debug_server_allows_anonymous() {
    let root = TempDir::new().unwrap();
    write_script(&root, "apps/open.js", "function f() { return 1; }");
    let addr = start_server(&root, true, None).await;

    let response = reqwest::get(url(addr, "/scripts/demo/apps/open.f"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

// ============================================================================
// Scenario 5: Permission hook
// ============================================================================

#[tokio::test]
async fn test_permission_hook_gates_by_app_scope() {
    let root = TempDir::new().unwrap();
    write_script(&root, "apps/calc.js", "function one() { return 1; }");
    let hook: PermissionHook = Arc::new(|app, user, _path| app == "allowed" && user.is_some());
    let addr = start_server(&root, false, Some(hook)).await;
    let client = reqwest::Client::new();

    let denied = client
        .get(url(addr, "/scripts/blocked/apps/calc.one"))
        .basic_auth("alice", Some("pw"))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status().as_u16(), 401);
    let payload: Value = denied.json().await.unwrap();
    assert_eq!(payload["error"], json!("PermissionError"));
    assert!(payload["message"].as_str().unwrap().contains("alice"));

    let allowed = client
        .get(url(addr, "/scripts/allowed/apps/calc.one"))
        .basic_auth("alice", Some("pw"))
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status().as_u16(), 200);
}

// ============================================================================
// Scenario 6: Accept-header negotiation
// ============================================================================

#[tokio::test]
async fn test_accept_text_plain_renders_scalar() {
    let root = TempDir::new().unwrap();
    write_script(&root, "apps/answer.js", "function answer() { return 42; }");
    let addr = start_server(&root, true, None).await;

    let response = reqwest::Client::new()
        .get(url(addr, "/scripts/demo/apps/answer.answer"))
        .header(ACCEPT, "text/plain, application/json;q=0.5")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
    assert_eq!(response.text().await.unwrap(), "42");
}

// ============================================================================
// Scenario 7: Failures map to 500 with a typed payload
// ============================================================================

#[tokio::test]
async fn test_script_throw_maps_to_500() {
    let root = TempDir::new().unwrap();
    write_script(
        &root,
        "apps/bad.js",
        "function explode() { throw new Error('boom'); }",
    );
    let addr = start_server(&root, true, None).await;

    let response = reqwest::get(url(addr, "/scripts/demo/apps/bad.explode"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    let payload: Value = response.json().await.unwrap();
    assert_eq!(payload["error"], json!("InvocationError"));
    assert!(payload["message"].as_str().unwrap().contains("boom"));
}

#[tokio::test]
async fn test_missing_argument_maps_to_500() {
    let root = TempDir::new().unwrap();
    write_script(&root, "apps/strict.js", "function need(x) { return x; }");
    let addr = start_server(&root, true, None).await;

    let response = reqwest::get(url(addr, "/scripts/demo/apps/strict.need"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    let payload: Value = response.json().await.unwrap();
    assert_eq!(payload["error"], json!("MissingArgumentError"));
    assert!(payload["message"].as_str().unwrap().contains('x'));
}

#[tokio::test]
async fn test_unknown_unit_maps_to_500() {
    let root = TempDir::new().unwrap();
    let addr = start_server(&root, true, None).await;

    let response = reqwest::get(url(addr, "/scripts/demo/apps/ghost.f"))
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    let payload: Value = response.json().await.unwrap();
    assert_eq!(payload["error"], json!("UnitNotFoundError"));
}

// ============================================================================
// Scenario 8: /whoami
// ============================================================================

#[tokio::test]
async fn test_whoami_reports_identity() {
    let root = TempDir::new().unwrap();
    let addr = start_server(&root, false, None).await;
    let client = reqwest::Client::new();

    let named: Value = client
        .get(url(addr, "/whoami"))
        .basic_auth("alice", Some("pw"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(named, json!("alice"));

    let anonymous: Value = client
        .get(url(addr, "/whoami"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(anonymous, json!(null));
}

// ============================================================================
// Scenario 9: Unit reload after file edits
// ============================================================================

#[tokio::test]
async fn test_unit_reloads_between_requests() {
    let root = TempDir::new().unwrap();
    write_script(&root, "apps/live.js", "function v() { return 'one'; }");
    let addr = start_server(&root, true, None).await;
    let target = url(addr, "/scripts/demo/apps/live.v");

    let first: Value = reqwest::get(&target).await.unwrap().json().await.unwrap();
    assert_eq!(first, json!("one"));

    write_script(&root, "apps/live.js", "function v() { return 'two'; }");
    let second: Value = reqwest::get(&target).await.unwrap().json().await.unwrap();
    assert_eq!(second, json!("two"));
}

// ============================================================================
// Scenario 10: Unknown routes and catch-all parameters
// ============================================================================

#[tokio::test]
async fn test_unknown_route_is_404() {
    let root = TempDir::new().unwrap();
    let addr = start_server(&root, true, None).await;

    let response = reqwest::get(url(addr, "/nope")).await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let payload: Value = response.json().await.unwrap();
    assert_eq!(payload["error"], json!("NotFoundError"));

    // an app scope without a wire path is not a script route
    let response = reqwest::get(url(addr, "/scripts/demo")).await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_catch_all_receives_unmatched_entries() {
    let root = TempDir::new().unwrap();
    write_script(
        &root,
        "apps/tally.js",
        "function tally(label, ...entries) { return { label: label, extras: entries[0] }; }",
    );
    let addr = start_server(&root, true, None).await;

    let value: Value = reqwest::get(url(
        addr,
        "/scripts/demo/apps/tally.tally?label=totals&east=1&west=2",
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(
        value,
        json!({"label": "totals", "extras": {"east": "1", "west": "2"}})
    );
}
