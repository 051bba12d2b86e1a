//! Push reconciled column and hierarchy metadata to a destination dataset

use log::{info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::api::client::LuzmoClient;
use crate::api::resilience::{ApiLogger, CallOutcome};
use crate::error::{StageContext, SyncResult};

use super::fanout::{outcomes_only, run_all, split_outcomes};
use super::reconcile::{
    ColumnUpdatePayload, HierarchyUpdatePayload, match_columns, match_hierarchies, reconcile,
};
use super::schema::{fetch_column_details, fetch_dataset_schema, fetch_hierarchy_details};

/// What one dataset pair sync did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub source_dataset_id: String,
    pub destination_dataset_id: String,
    pub columns_fetched: usize,
    pub columns_matched: usize,
    pub columns_updated: usize,
    pub hierarchies_fetched: usize,
    pub hierarchies_matched: usize,
    pub hierarchies_updated: usize,
    pub duplicate_names: Vec<String>,
    pub failures: Vec<String>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Copies column and hierarchy metadata from source datasets onto destination datasets
#[derive(Debug, Clone)]
pub struct MetadataUpdater {
    client: LuzmoClient,
}

impl MetadataUpdater {
    /// Source and destination datasets live in the same tenant
    pub fn new(client: LuzmoClient) -> Self {
        Self { client }
    }

    pub fn logger(&self) -> &ApiLogger {
        self.client.retry_policy().logger()
    }

    pub async fn update_column(&self, payload: &ColumnUpdatePayload) -> CallOutcome<Value> {
        self.client
            .update_column(&payload.target_column_id, &payload.properties)
            .await
    }

    pub async fn update_hierarchy(&self, payload: &HierarchyUpdatePayload) -> CallOutcome<Value> {
        self.client
            .update_hierarchy(&payload.target_column_id, &payload.updates)
            .await
    }

    /// Copy every matching column's properties and hierarchy from `source_id`
    /// onto `destination_id`.
    ///
    /// Per-column failures are collected in the report. Only a failure to read
    /// either schema fails the whole pair.
    pub async fn sync_dataset_pair(
        &self,
        source_id: &str,
        destination_id: &str,
    ) -> SyncResult<SyncReport> {
        info!("Syncing dataset metadata {} -> {}", source_id, destination_id);

        let (source_schema, destination_schema) = futures::join!(
            fetch_dataset_schema(&self.client, source_id),
            fetch_dataset_schema(&self.client, destination_id),
        );
        let source_schema = source_schema.stage(format!("fetch source schema {}", source_id))?;
        let destination_schema =
            destination_schema.stage(format!("fetch destination schema {}", destination_id))?;

        let index = reconcile(&source_schema, &destination_schema);

        let mut report = SyncReport {
            source_dataset_id: source_id.to_string(),
            destination_dataset_id: destination_id.to_string(),
            duplicate_names: index.duplicates().to_vec(),
            ..Default::default()
        };

        let (column_outcomes, hierarchy_outcomes) = futures::join!(
            fetch_column_details(&self.client, &source_schema),
            fetch_hierarchy_details(&self.client, &source_schema),
        );
        let (column_details, column_failures) = split_outcomes(column_outcomes);
        let (hierarchy_details, hierarchy_failures) = split_outcomes(hierarchy_outcomes);
        report.columns_fetched = column_details.len();
        report.hierarchies_fetched = hierarchy_details.len();
        report
            .failures
            .extend(column_failures.iter().map(|f| format!("fetch column: {}", f)));
        report
            .failures
            .extend(hierarchy_failures.iter().map(|f| format!("fetch hierarchy: {}", f)));

        let column_updates = match_columns(&column_details, &index);
        let hierarchy_updates = match_hierarchies(&hierarchy_details, &source_schema, &index);
        report.columns_matched = column_updates.len();
        report.hierarchies_matched = hierarchy_updates.len();

        let logger = self.logger();
        let column_label = format!("update columns of {}", destination_id);
        let hierarchy_label = format!("update hierarchies of {}", destination_id);
        let (column_results, hierarchy_results) = futures::join!(
            run_all(logger, &column_label, column_updates.iter().collect(), |payload| {
                Ok(self.update_column(payload))
            }),
            run_all(logger, &hierarchy_label, hierarchy_updates.iter().collect(), |payload| {
                Ok(self.update_hierarchy(payload))
            }),
        );

        let (updated, failed) = split_outcomes(outcomes_only(column_results));
        report.columns_updated = updated.len();
        report.failures.extend(failed.iter().map(|f| format!("update column: {}", f)));

        let (updated, failed) = split_outcomes(outcomes_only(hierarchy_results));
        report.hierarchies_updated = updated.len();
        report.failures.extend(failed.iter().map(|f| format!("update hierarchy: {}", f)));

        if report.is_complete() {
            info!(
                "Synced {} -> {}: {} columns, {} hierarchies",
                source_id, destination_id, report.columns_updated, report.hierarchies_updated
            );
        } else {
            warn!(
                "Synced {} -> {} with {} failures: {} columns, {} hierarchies",
                source_id,
                destination_id,
                report.failures.len(),
                report.columns_updated,
                report.hierarchies_updated
            );
        }

        Ok(report)
    }
}
