#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::MockServer;

use aizen_client::config::{ClientConfig, PollingConfig};
use aizen_client::session::{MemoryBackend, TokenStore};
use aizen_client::{AizenClient, ClientEvent};

pub fn init_logging() {
    aizen_client::init_tracing();
}

pub fn test_config(server: &MockServer, interval_ms: u64, max_attempts: u32) -> ClientConfig {
    let mut config = ClientConfig::with_base_url(server.uri());
    config.request_timeout_secs = 5;
    config.polling = PollingConfig {
        interval_ms,
        max_attempts,
    };
    config
}

/// Client with an empty in-memory session.
pub fn logged_out_client(server: &MockServer) -> (AizenClient, Arc<TokenStore>) {
    let store = Arc::new(TokenStore::in_memory());
    let client = AizenClient::with_store(test_config(server, 10, 25), store.clone()).unwrap();
    (client, store)
}

/// Client whose session was persisted by an earlier run.
pub fn logged_in_client(
    server: &MockServer,
    access: &str,
    refresh: &str,
    interval_ms: u64,
    max_attempts: u32,
) -> (AizenClient, Arc<TokenStore>) {
    let store = Arc::new(TokenStore::load(Box::new(MemoryBackend::with_tokens(
        access, refresh,
    ))));
    let client =
        AizenClient::with_store(test_config(server, interval_ms, max_attempts), store.clone())
            .unwrap();
    (client, store)
}

pub fn image_json(id: i64, name: &str, description: Option<&str>) -> Value {
    json!({
        "id": id,
        "name": name,
        "upload_date": "2024-10-01T12:00:00Z",
        "description": description,
        "signed_url": format!("https://cdn.example.com/{}", name),
    })
}

pub fn token_not_valid() -> Value {
    json!({
        "detail": "Given token not valid for any token type",
        "code": "token_not_valid",
        "messages": [{"token_class": "AccessToken", "token_type": "access", "message": "Token is invalid or expired"}]
    })
}

/// Requests the server received for `method` + `path`.
pub async fn count_requests(server: &MockServer, method: &str, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == method && r.url.path() == path)
        .count()
}

/// Drain whatever events are already queued.
pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
