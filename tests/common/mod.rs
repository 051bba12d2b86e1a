//! Shared fixtures for tests that talk to a mock Luzmo API
#![allow(dead_code)]

use dashboard_cloner::api::{
    ApiLogger, CredentialPair, CredentialPool, LogLevel, LuzmoClient, MonitoringConfig,
    RetryConfig, RetryPolicy,
};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Retry settings with millisecond backoff so tests stay fast
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
        jitter: false,
        execution_budget: Duration::from_secs(30),
    }
}

pub fn quiet_logger() -> ApiLogger {
    ApiLogger::new(MonitoringConfig {
        correlation_ids: true,
        request_logging: false,
        log_level: LogLevel::Error,
    })
}

pub fn test_client(server: &MockServer) -> LuzmoClient {
    test_client_with(server, RetryPolicy::new(fast_retry(3)))
}

pub fn test_client_with(server: &MockServer, policy: RetryPolicy) -> LuzmoClient {
    let credentials = CredentialPool::single(CredentialPair::new("test-key", "test-token"));
    LuzmoClient::with_http_client(
        server.uri(),
        reqwest::Client::new(),
        credentials,
        policy.with_logger(quiet_logger()),
    )
}

pub fn column(id: &str, name: &str, column_type: &str) -> Value {
    json!({"id": id, "name": {"en": name}, "type": column_type})
}

/// Answer a dataset schema lookup for `dataset_id`
pub async fn mount_schema(server: &MockServer, dataset_id: &str, columns: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path("/securable"))
        .and(body_partial_json(json!({
            "action": "get",
            "find": {"where": {"type": "dataset", "id": dataset_id}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "rows": [{"id": dataset_id, "columns": columns}]
        })))
        .mount(server)
        .await;
}

/// Answer a column lookup with the full property bag
pub async fn mount_column(server: &MockServer, properties: Value) {
    let id = properties["id"].clone();
    Mock::given(method("POST"))
        .and(path("/column"))
        .and(body_partial_json(json!({"action": "get", "find": {"where": {"id": id}}})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"count": 1, "rows": [properties]})),
        )
        .mount(server)
        .await;
}

pub async fn mount_hierarchy(server: &MockServer, column_id: &str, dataset_id: &str, roots: Value) {
    Mock::given(method("POST"))
        .and(path("/hierarchy"))
        .and(body_partial_json(json!({
            "action": "get",
            "find": {"where": {"column_id": column_id, "securable_id": dataset_id}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(roots))
        .mount(server)
        .await;
}

/// Accept every `update` on `resource`
pub async fn mount_updates(server: &MockServer, resource: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/{}", resource)))
        .and(body_partial_json(json!({"action": "update"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
}

pub fn body(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap_or(Value::Null)
}

/// Bodies of every received request to `resource` with the given action
pub async fn received(server: &MockServer, resource: &str, action: &str) -> Vec<Value> {
    let requests = server.received_requests().await.unwrap_or_default();
    requests
        .iter()
        .filter(|r| r.url.path() == format!("/{}", resource))
        .map(body)
        .filter(|b| b["action"] == action)
        .collect()
}

/// Answer a dashboard lookup with the given document row
pub async fn mount_dashboard(server: &MockServer, document: Value) {
    let id = document["id"].clone();
    Mock::given(method("POST"))
        .and(path("/securable"))
        .and(body_partial_json(json!({
            "action": "get",
            "find": {"where": {"id": id, "type": "dashboard"}}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"count": 1, "rows": [document]})),
        )
        .mount(server)
        .await;
}

/// Accept dashboard creation, answering with `new_id`
pub async fn mount_create_dashboard(server: &MockServer, new_id: &str) {
    Mock::given(method("POST"))
        .and(path("/securable"))
        .and(body_partial_json(json!({"action": "create"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": new_id})))
        .mount(server)
        .await;
}

/// A dashboard on dataset `old-ds` that uses its Revenue, Region and Legacy columns
pub fn sales_dashboard(id: &str) -> Value {
    json!({
        "id": id,
        "name": {"en": "Sales"},
        "datasets": [{
            "id": "old-ds",
            "name": {"en": "Sales data"},
            "columns": [
                {"id": "old-rev", "name": {"en": "Revenue"}},
                {"id": "old-region", "name": {"en": "Region"}},
                {"id": "old-legacy", "name": {"en": "Legacy"}}
            ]
        }],
        "contents": {
            "views": [{
                "items": [
                    {
                        "id": "chart-1",
                        "type": "bar-chart",
                        "options": {"title": {"en": "Totals for old-rev"}},
                        "slots": [{"content": [
                            {"column": "old-rev", "set": "old-ds"},
                            {"column": "old-legacy", "set": "old-ds"}
                        ]}]
                    },
                    {
                        "id": "filter-1",
                        "type": "dropdown-filter",
                        "options": {"placeholder": {"en": "Region"}},
                        "slots": [{"content": [{"column": "old-region", "set": "old-ds"}]}]
                    }
                ]
            }],
            "parameters": {"old-rev": {"format": ",.0f"}}
        },
        "css": ".chart { color: red; }"
    })
}
