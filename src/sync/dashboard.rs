//! Clone a dashboard onto new datasets
//!
//! The source dashboard is read with the template tenant's credentials, its
//! dataset and column ids are translated to the destination datasets by
//! lowercase column name, and a new dashboard is created with the
//! destination tenant's credentials.

use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use crate::api::client::LuzmoClient;
use crate::api::models::{DashboardDocument, DashboardFilter, DatasetSchema, localized_name};
use crate::api::resilience::CallOutcome;
use crate::error::{StageContext, SyncError, SyncResult};

use super::fanout::{pair_with_inputs, run_all};
use super::remap::{IdRemapTable, build_dataset_remap};

/// Item types treated as dashboard filters
pub const FILTER_ITEM_TYPES: [&str; 7] = [
    "date-filter",
    "dropdown-filter",
    "slider-filter",
    "datefilter",
    "slider",
    "selectbox",
    "slicer",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClonedDashboard {
    pub source_dashboard_id: String,
    pub dashboard_id: String,
    pub name: String,
    pub ids_remapped: usize,
    pub unresolved_columns: usize,
}

#[derive(Debug, Clone)]
pub struct DashboardCloner {
    source: LuzmoClient,
    destination: LuzmoClient,
}

impl DashboardCloner {
    pub fn new(source: LuzmoClient, destination: LuzmoClient) -> Self {
        Self { source, destination }
    }

    pub fn destination(&self) -> &LuzmoClient {
        &self.destination
    }

    /// Clone `source_dashboard_id` with every dataset in `dataset_map`
    /// (old id to new id) swapped for its replacement.
    ///
    /// Nothing is created unless the dashboard and every new schema can be read.
    pub async fn clone_dashboard(
        &self,
        source_dashboard_id: &str,
        dataset_map: &BTreeMap<String, String>,
        new_name: &str,
    ) -> SyncResult<ClonedDashboard> {
        let document = self
            .source
            .get_dashboard(source_dashboard_id)
            .await
            .stage(format!("fetch dashboard {}", source_dashboard_id))?;

        let table = self.build_remap(&document, dataset_map).await?;
        let remapped = remap_dashboard(&document, &table)?;

        let dashboard_id = self
            .destination
            .create_dashboard(new_name, &remapped.contents, &remapped.css)
            .await
            .stage(format!("create dashboard {}", new_name))?;

        info!(
            "Cloned dashboard {} as {} ('{}'), {} ids mapped",
            source_dashboard_id,
            dashboard_id,
            new_name,
            table.len()
        );

        Ok(ClonedDashboard {
            source_dashboard_id: source_dashboard_id.to_string(),
            dashboard_id,
            name: new_name.to_string(),
            ids_remapped: table.len(),
            unresolved_columns: table.unresolved().len(),
        })
    }

    /// Translation table covering every dataset pair of `dataset_map`
    pub async fn build_remap(
        &self,
        document: &DashboardDocument,
        dataset_map: &BTreeMap<String, String>,
    ) -> SyncResult<IdRemapTable> {
        for old_id in dataset_map.keys() {
            if document.dataset(old_id).is_none() {
                return Err(SyncError::DatasetNotReferenced {
                    dashboard_id: document.id.clone(),
                    dataset_id: old_id.clone(),
                });
            }
        }

        let pairs: Vec<(&String, &String)> = dataset_map.iter().collect();
        let label = format!("fetch schemas for dashboard {}", document.id);
        let schemas = run_all(
            self.destination.retry_policy().logger(),
            &label,
            pairs.clone(),
            |(_, new_id)| Ok(self.destination.get_dataset_schema(new_id)),
        )
        .await;

        let mut table = IdRemapTable::new();
        for ((old_id, new_id), schema) in pair_with_inputs(pairs, schemas) {
            let schema: DatasetSchema = schema.stage(format!("fetch schema {}", new_id))?;
            if schema.is_empty() {
                return Err(SyncError::EmptySchema(new_id.clone()));
            }
            if let Some(old_dataset) = document.dataset(old_id) {
                let dataset_table = build_dataset_remap(old_dataset, &schema);
                if !dataset_table.unresolved().is_empty() {
                    warn!(
                        "{} columns of dataset {} have no match in {}",
                        dataset_table.unresolved().len(),
                        old_id,
                        new_id
                    );
                }
                table.extend(dataset_table);
            }
        }
        Ok(table)
    }
}

/// Apply a translation table to the whole dashboard document
pub fn remap_dashboard(
    document: &DashboardDocument,
    table: &IdRemapTable,
) -> SyncResult<DashboardDocument> {
    let mut value =
        serde_json::to_value(document).map_err(|e| SyncError::InvalidDocument(e.to_string()))?;
    let replaced = table.rewrite(&mut value);
    log::debug!("Rewrote {} id references in dashboard {}", replaced, document.id);
    serde_json::from_value(value).map_err(|e| SyncError::InvalidDocument(e.to_string()))
}

/// Filter widgets on a dashboard, in view order, each id listed once
pub fn dashboard_filters(contents: &Value) -> Vec<DashboardFilter> {
    let mut seen = HashSet::new();
    let mut filters = Vec::new();

    let views = contents
        .get("views")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    for view in views {
        let items = view
            .get("items")
            .and_then(|i| i.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();

        for item in items {
            let is_filter = item
                .get("type")
                .and_then(|t| t.as_str())
                .is_some_and(|t| FILTER_ITEM_TYPES.contains(&t));
            let Some(id) = item.get("id").and_then(|i| i.as_str()) else {
                continue;
            };
            if !is_filter || !seen.insert(id.to_string()) {
                continue;
            }
            let name = item
                .get("options")
                .and_then(|o| o.get("placeholder"))
                .and_then(localized_name)
                .unwrap_or_default();
            filters.push(DashboardFilter {
                id: id.to_string(),
                name: name.to_string(),
            });
        }
    }

    filters
}

/// Read a dashboard and list its filter widgets
pub async fn fetch_dashboard_filters(
    client: &LuzmoClient,
    dashboard_id: &str,
) -> SyncResult<Vec<DashboardFilter>> {
    let outcome: CallOutcome<DashboardDocument> = client.get_dashboard(dashboard_id).await;
    let document = outcome.stage(format!("fetch dashboard filters {}", dashboard_id))?;
    Ok(dashboard_filters(&document.contents))
}
