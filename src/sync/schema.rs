//! Dataset schema, column and hierarchy retrieval

use crate::api::client::LuzmoClient;
use crate::api::models::{ColumnDetail, DatasetSchema, HierarchyDetail, SchemaColumn};
use crate::api::resilience::CallOutcome;

use super::fanout::{outcomes_only, run_all};

pub async fn fetch_dataset_schema(
    client: &LuzmoClient,
    dataset_id: &str,
) -> CallOutcome<DatasetSchema> {
    client.get_dataset_schema(dataset_id).await
}

/// Properties of one column, tagged with the name it has in the schema
pub async fn fetch_column_detail(
    client: &LuzmoClient,
    column: &SchemaColumn,
) -> CallOutcome<ColumnDetail> {
    let column_id = column.id.clone();
    let name = column.name.clone();
    client
        .get_column(&column.id)
        .await
        .map(|properties| ColumnDetail {
            column_id,
            name,
            properties,
        })
}

pub async fn fetch_hierarchy_detail(
    client: &LuzmoClient,
    column_id: &str,
    dataset_id: &str,
) -> CallOutcome<HierarchyDetail> {
    let id = column_id.to_string();
    client
        .get_hierarchy(column_id, dataset_id)
        .await
        .map(|roots| HierarchyDetail { column_id: id, roots })
}

/// Fetch every column of a schema in one concurrent batch
pub async fn fetch_column_details(
    client: &LuzmoClient,
    schema: &DatasetSchema,
) -> Vec<CallOutcome<ColumnDetail>> {
    let label = format!("fetch columns of {}", schema.dataset_id);
    let outcomes = run_all(
        client.retry_policy().logger(),
        &label,
        schema.columns.iter().collect(),
        |column| Ok(fetch_column_detail(client, column)),
    )
    .await;
    outcomes_only(outcomes)
}

/// Fetch the tree of every hierarchy column of a schema in one concurrent batch
pub async fn fetch_hierarchy_details(
    client: &LuzmoClient,
    schema: &DatasetSchema,
) -> Vec<CallOutcome<HierarchyDetail>> {
    let label = format!("fetch hierarchies of {}", schema.dataset_id);
    let dataset_id = schema.dataset_id.as_str();
    let outcomes = run_all(
        client.retry_policy().logger(),
        &label,
        schema.hierarchy_column_ids.iter().collect(),
        |column_id| Ok(fetch_hierarchy_detail(client, column_id, dataset_id)),
    )
    .await;
    outcomes_only(outcomes)
}
