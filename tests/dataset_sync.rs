//! Dataset metadata sync against a mock API

mod common;

use common::{
    column, mount_column, mount_hierarchy, mount_schema, mount_updates, received, test_client,
};
use dashboard_cloner::SyncError;
use dashboard_cloner::sync::MetadataUpdater;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use wiremock::MockServer;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_source_and_destination(server: &MockServer) {
    mount_schema(
        server,
        "ds-src",
        vec![
            column("s-rev", "Revenue", "numeric"),
            column("s-geo", "Geography", "hierarchy"),
            column("s-only", "Only In Source", "numeric"),
        ],
    )
    .await;
    mount_schema(
        server,
        "ds-dst",
        vec![
            column("d-rev", "Revenue", "numeric"),
            column("d-geo", "Geography", "hierarchy"),
            column("d-rev-2", "Revenue", "numeric"),
        ],
    )
    .await;

    mount_column(
        server,
        json!({
            "id": "s-rev",
            "name": {"en": "Revenue"},
            "format": ",.2f",
            "description": {"en": "Net revenue"},
            "minimum": 3,
            "maximum": 90210,
            "cardinality": 412,
            "securable_id": "ds-src"
        }),
    )
    .await;
    mount_column(
        server,
        json!({"id": "s-geo", "name": {"en": "Geography"}, "color": "#336699", "version": 4}),
    )
    .await;
    mount_column(
        server,
        json!({"id": "s-only", "name": {"en": "Only In Source"}, "format": "d"}),
    )
    .await;

    mount_hierarchy(
        server,
        "s-geo",
        "ds-src",
        json!([{
            "id": "root",
            "children": [
                {"id": "eu", "name": {"en": "Europe"}, "children": [{"id": null}, {"id": "be"}]},
                {"id": null, "name": {"en": "Unassigned"}}
            ]
        }]),
    )
    .await;

    mount_updates(server, "column").await;
    mount_updates(server, "hierarchy").await;
}

fn properties_by_target(bodies: &[Value]) -> BTreeMap<String, Value> {
    bodies
        .iter()
        .map(|b| (b["id"].as_str().unwrap_or_default().to_string(), b["properties"].clone()))
        .collect()
}

#[tokio::test]
async fn test_sync_copies_matching_columns_only() {
    let server = MockServer::start().await;
    mount_source_and_destination(&server).await;

    let updater = MetadataUpdater::new(test_client(&server));
    let report = updater.sync_dataset_pair("ds-src", "ds-dst").await.unwrap();

    assert!(report.is_complete(), "failures: {:?}", report.failures);
    assert_eq!(report.columns_fetched, 3);
    assert_eq!(report.columns_matched, 2);
    assert_eq!(report.columns_updated, 2);
    assert_eq!(report.hierarchies_updated, 1);
    assert_eq!(report.duplicate_names, vec!["Revenue".to_string()]);

    let updates = properties_by_target(&received(&server, "column", "update").await);
    // d-rev and d-rev-2 share a name, the later column is the target
    assert_eq!(updates.keys().collect::<Vec<_>>(), vec!["d-geo", "d-rev-2"]);

    let revenue = &updates["d-rev-2"];
    assert_eq!(revenue["format"], ",.2f");
    assert_eq!(revenue["description"], json!({"en": "Net revenue"}));
    for excluded in ["id", "name", "minimum", "maximum", "cardinality", "securable_id"] {
        assert!(revenue.get(excluded).is_none(), "{} should not be copied", excluded);
    }
    assert!(updates["d-geo"].get("version").is_none());
}

#[tokio::test]
async fn test_hierarchy_update_drops_unassigned_nodes() {
    let server = MockServer::start().await;
    mount_source_and_destination(&server).await;

    MetadataUpdater::new(test_client(&server))
        .sync_dataset_pair("ds-src", "ds-dst")
        .await
        .unwrap();

    let updates = received(&server, "hierarchy", "update").await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["id"], "d-geo");
    assert_eq!(
        updates[0]["properties"]["updates"],
        json!([{"id": "eu", "name": {"en": "Europe"}, "children": [{"id": "be"}]}])
    );
}

#[tokio::test]
async fn test_repeated_sync_sends_identical_updates() {
    let server = MockServer::start().await;
    mount_source_and_destination(&server).await;
    let updater = MetadataUpdater::new(test_client(&server));

    updater.sync_dataset_pair("ds-src", "ds-dst").await.unwrap();
    let first_run = received(&server, "column", "update").await;

    updater.sync_dataset_pair("ds-src", "ds-dst").await.unwrap();
    let both_runs = received(&server, "column", "update").await;
    let second_run = &both_runs[first_run.len()..];

    assert_eq!(second_run.len(), first_run.len());
    assert_eq!(properties_by_target(&first_run), properties_by_target(second_run));
}

#[tokio::test]
async fn test_failed_column_update_is_reported_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/column"))
        .and(body_partial_json(json!({"action": "update", "id": "d-geo"})))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;
    mount_source_and_destination(&server).await;

    let report = MetadataUpdater::new(test_client(&server))
        .sync_dataset_pair("ds-src", "ds-dst")
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.columns_updated, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].starts_with("update column"));
}

#[tokio::test]
async fn test_unreadable_destination_schema_fails_pair() {
    let server = MockServer::start().await;
    mount_schema(&server, "ds-src", vec![column("s-rev", "Revenue", "numeric")]).await;
    Mock::given(method("POST"))
        .and(path("/securable"))
        .and(body_partial_json(json!({"find": {"where": {"id": "ds-gone"}}})))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = MetadataUpdater::new(test_client(&server))
        .sync_dataset_pair("ds-src", "ds-gone")
        .await;

    match result {
        Err(SyncError::Call { stage, .. }) => assert!(stage.contains("ds-gone")),
        other => panic!("expected a call error, got {:?}", other),
    }
    assert!(received(&server, "column", "update").await.is_empty());
}
