//! Common test utilities for dispatch integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use talk_client::{DispatchClient, DispatchOptions, InlineExecutor, RetryPolicy};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Options pointing every backend and the sidecar at one mock server.
pub fn test_options(mock_server: &MockServer) -> DispatchOptions {
    DispatchOptions {
        write_url: format!("{}/talk/write", mock_server.uri()),
        reaction_base_url: mock_server.uri(),
        open_base_url: format!("{}/moim", mock_server.uri()),
        talk_base_url: format!("{}/board", mock_server.uri()),
        poll_retry: RetryPolicy::poll().with_delay(Duration::from_millis(10)),
        ..DispatchOptions::default()
    }
}

/// Client that runs background sends inline.
pub fn inline_client(mock_server: &MockServer) -> DispatchClient {
    DispatchClient::with_executor(test_options(mock_server), Arc::new(InlineExecutor)).unwrap()
}

pub fn aot_body(token: &str, device: &str) -> Value {
    json!({
        "success": true,
        "aot": { "access_token": token, "d_id": device }
    })
}

/// Serve `AT1`/`DEV1` from the sidecar, expecting `fetches` requests.
pub async fn mount_aot(mock_server: &MockServer, fetches: u64) {
    Mock::given(method("GET"))
        .and(path("/aot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(aot_body("AT1", "DEV1")))
        .expect(fetches)
        .mount(mock_server)
        .await;
}

/// Serve the link id lookup for `room_id`, expecting `lookups` requests.
pub async fn mount_link_id(mock_server: &MockServer, room_id: &str, link_id: Value, lookups: u64) {
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_string_contains("SELECT id, link_id"))
        .and(body_partial_json(json!({ "bind": [room_id] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": room_id, "link_id": link_id, "type": "OM" }]
        })))
        .expect(lookups)
        .mount(mock_server)
        .await;
}

/// JSON bodies of every request received on `request_path`.
pub async fn bodies_for(mock_server: &MockServer, request_path: &str) -> Vec<Value> {
    mock_server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == request_path)
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}
