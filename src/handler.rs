//! Entry points used by the binary and by queue consumers
//!
//! A sync message carries dataset pairs whose metadata should be copied. A
//! clone run takes dashboard jobs: it syncs each dataset pair once per run,
//! clones the dashboard onto the new datasets, files it in a collection and
//! lists the new dashboard's filters.

use anyhow::Context;
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::api::client::LuzmoClient;
use crate::api::models::DashboardFilter;
use crate::api::resilience::CallOutcome;
use crate::audit::{AuditRecord, AuditSink};
use crate::error::{StageContext, SyncError, SyncResult};
use crate::sync::dashboard::{ClonedDashboard, DashboardCloner, fetch_dashboard_filters};
use crate::sync::fanout::{pair_with_inputs, run_all};
use crate::sync::registry::DedupRegistry;
use crate::sync::updater::{MetadataUpdater, SyncReport};

/// Queue message asking for dataset metadata to be synced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    #[serde(default, deserialize_with = "string_or_number")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub dash_type: Option<String>,
    /// Source dataset id to destination dataset id
    #[serde(alias = "payload")]
    pub pairs: BTreeMap<String, String>,
}

impl SyncMessage {
    pub fn parse(bytes: &[u8]) -> SyncResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| SyncError::InvalidMessage(e.to_string()))
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Result of syncing one dataset pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairReport {
    pub source_dataset_id: String,
    pub destination_dataset_id: String,
    pub report: Option<SyncReport>,
    pub error: Option<String>,
}

impl PairReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.report.as_ref().is_some_and(SyncReport::is_complete)
    }
}

/// Sync every pair concurrently, recording one audit entry per pair
pub async fn sync_pairs(
    updater: &MetadataUpdater,
    audit: &dyn AuditSink,
    label: &str,
    pairs: Vec<(String, String)>,
) -> Vec<PairReport> {
    let outcomes = run_all(updater.logger(), label, pairs.clone(), |(source, destination)| {
        Ok(async move {
            let result = updater.sync_dataset_pair(&source, &destination).await;
            CallOutcome::Success(pair_report(source, destination, result))
        })
    })
    .await;

    let mut reports = Vec::with_capacity(pairs.len());
    for ((source, destination), outcome) in pair_with_inputs(pairs, outcomes) {
        let report = match outcome.into_result() {
            Ok(report) => report,
            Err(failure) => PairReport {
                source_dataset_id: source,
                destination_dataset_id: destination,
                report: None,
                error: Some(failure.to_string()),
            },
        };

        let stage = format!(
            "sync dataset {} -> {}",
            report.source_dataset_id, report.destination_dataset_id
        );
        let record = match (&report.error, &report.report) {
            (Some(error), _) => AuditRecord::failure(stage, error),
            (None, Some(r)) if !r.is_complete() => {
                AuditRecord::failure(stage, r.failures.join("; "))
            }
            _ => AuditRecord::success(stage),
        };
        audit.record(record).await;
        reports.push(report);
    }
    reports
}

fn pair_report(source: String, destination: String, result: SyncResult<SyncReport>) -> PairReport {
    match result {
        Ok(report) => PairReport {
            source_dataset_id: source,
            destination_dataset_id: destination,
            report: Some(report),
            error: None,
        },
        Err(e) => {
            warn!("Dataset sync {} -> {} failed: {}", source, destination, e);
            PairReport {
                source_dataset_id: source,
                destination_dataset_id: destination,
                report: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Parse a queue message and sync all of its pairs
pub async fn handle_sync_message(
    updater: &MetadataUpdater,
    audit: &dyn AuditSink,
    bytes: &[u8],
) -> SyncResult<Vec<PairReport>> {
    let message = SyncMessage::parse(bytes)?;
    info!(
        "Sync message for client {} ({}): {} dataset pairs",
        message.client_id.as_deref().unwrap_or("-"),
        message.dash_type.as_deref().unwrap_or("-"),
        message.pairs.len()
    );

    let pairs: Vec<(String, String)> = message.pairs.into_iter().collect();
    let reports = sync_pairs(updater, audit, "sync message", pairs).await;
    audit.flush().await;
    Ok(reports)
}

/// Tenant a dashboard is cloned for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub client_id: String,
    pub client_name: String,
}

/// `<template>_<client_name>_<client_id>`, or the template name alone
pub fn derive_dashboard_name(template: &str, tenant: Option<&Tenant>) -> String {
    match tenant {
        Some(tenant) => format!("{}_{}_{}", template, tenant.client_name, tenant.client_id),
        None => template.to_string(),
    }
}

/// One dashboard to clone and the datasets it should point at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneJob {
    pub dashboard_id: String,
    pub dashboard_name: String,
    pub dataset_map: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub source_dashboard_id: String,
    pub synced: Vec<PairReport>,
    pub cloned: Option<ClonedDashboard>,
    pub filters: Vec<DashboardFilter>,
    pub error: Option<String>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.cloned.is_some()
    }
}

/// State of one clone run. Each dataset is synced at most once per run even
/// when several jobs reference it.
pub struct CloneRun {
    registry: DedupRegistry,
    updater: MetadataUpdater,
    cloner: DashboardCloner,
    audit: Arc<dyn AuditSink>,
    tenant: Option<Tenant>,
    collection_id: Option<String>,
}

impl CloneRun {
    pub fn new(
        updater: MetadataUpdater,
        cloner: DashboardCloner,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            registry: DedupRegistry::new(),
            updater,
            cloner,
            audit,
            tenant: None,
            collection_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant: Tenant) -> Self {
        self.tenant = Some(tenant);
        self
    }

    pub fn with_collection(mut self, collection_id: impl Into<String>) -> Self {
        self.collection_id = Some(collection_id.into());
        self
    }

    pub fn registry(&self) -> &DedupRegistry {
        &self.registry
    }

    /// Run every job concurrently. One job failing does not stop the others.
    pub async fn run(&self, jobs: Vec<CloneJob>) -> Vec<JobReport> {
        let outcomes = run_all(self.updater.logger(), "clone dashboards", jobs.clone(), |job| {
            Ok(async move { CallOutcome::Success(self.run_job(&job).await) })
        })
        .await;

        let reports = pair_with_inputs(jobs, outcomes)
            .into_iter()
            .map(|(job, outcome)| match outcome.into_result() {
                Ok(report) => report,
                Err(failure) => JobReport {
                    source_dashboard_id: job.dashboard_id,
                    synced: Vec::new(),
                    cloned: None,
                    filters: Vec::new(),
                    error: Some(failure.to_string()),
                },
            })
            .collect();

        self.audit.flush().await;
        reports
    }

    pub async fn run_job(&self, job: &CloneJob) -> JobReport {
        let claimed: Vec<(String, String)> = job
            .dataset_map
            .iter()
            .filter(|(old_id, _)| self.registry.claim(old_id))
            .map(|(old_id, new_id)| (old_id.clone(), new_id.clone()))
            .collect();
        if claimed.len() < job.dataset_map.len() {
            info!(
                "Dashboard {}: {} of {} datasets already synced in this run",
                job.dashboard_id,
                job.dataset_map.len() - claimed.len(),
                job.dataset_map.len()
            );
        }

        let label = format!("sync datasets of {}", job.dashboard_id);
        let synced = sync_pairs(&self.updater, self.audit.as_ref(), &label, claimed).await;

        let mut report = JobReport {
            source_dashboard_id: job.dashboard_id.clone(),
            synced,
            cloned: None,
            filters: Vec::new(),
            error: None,
        };

        let name = derive_dashboard_name(&job.dashboard_name, self.tenant.as_ref());
        let stage = format!("clone dashboard {} as '{}'", job.dashboard_id, name);
        let cloned = match self
            .cloner
            .clone_dashboard(&job.dashboard_id, &job.dataset_map, &name)
            .await
        {
            Ok(cloned) => {
                self.audit
                    .record(AuditRecord::success(format!("{}: {}", stage, cloned.dashboard_id)))
                    .await;
                cloned
            }
            Err(e) => {
                warn!("Failed to {}: {}", stage, e);
                self.audit.record(AuditRecord::failure(stage, &e)).await;
                report.error = Some(e.to_string());
                return report;
            }
        };

        let destination = self.cloner.destination();
        if let Some(collection_id) = &self.collection_id {
            let stage = format!(
                "associate {} with collection {}",
                cloned.dashboard_id, collection_id
            );
            let record = match destination
                .associate_collection(collection_id, &cloned.dashboard_id)
                .await
                .stage(stage.clone())
            {
                Ok(_) => AuditRecord::success(stage),
                Err(e) => {
                    warn!("{}", e);
                    AuditRecord::failure(stage, e)
                }
            };
            self.audit.record(record).await;
        }

        match fetch_dashboard_filters(destination, &cloned.dashboard_id).await {
            Ok(filters) => report.filters = filters,
            Err(e) => {
                warn!("Could not list filters of {}: {}", cloned.dashboard_id, e);
                self.audit
                    .record(AuditRecord::failure(format!("filters of {}", cloned.dashboard_id), e))
                    .await;
            }
        }

        report.cloned = Some(cloned);
        report
    }
}

/// Create the collection new dashboards are filed under
pub async fn open_collection(client: &LuzmoClient, name: &str) -> SyncResult<String> {
    let collection_id = client
        .create_collection(name)
        .await
        .stage(format!("create collection {}", name))?;
    info!("Created collection '{}': {}", name, collection_id);
    Ok(collection_id)
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    dash_id: String,
    src_dataset_id: String,
    dest_dataset_id: String,
    dashboard_name: String,
}

/// Read clone jobs from CSV rows of
/// `dash_id,src_dataset_id,dest_dataset_id,dashboard_name`, one row per
/// dataset pair, grouped by dashboard in first-seen order
pub fn read_catalog<R: Read>(reader: R) -> anyhow::Result<Vec<CloneJob>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut jobs: Vec<CloneJob> = Vec::new();
    for (line, row) in csv_reader.deserialize::<CatalogRow>().enumerate() {
        let row = row.with_context(|| format!("Invalid catalog row {}", line + 2))?;
        match jobs.iter_mut().find(|job| job.dashboard_id == row.dash_id) {
            Some(job) => {
                job.dataset_map.insert(row.src_dataset_id, row.dest_dataset_id);
            }
            None => jobs.push(CloneJob {
                dashboard_id: row.dash_id,
                dashboard_name: row.dashboard_name,
                dataset_map: BTreeMap::from([(row.src_dataset_id, row.dest_dataset_id)]),
            }),
        }
    }
    Ok(jobs)
}

pub fn read_catalog_file(path: &Path) -> anyhow::Result<Vec<CloneJob>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open catalog: {:?}", path))?;
    read_catalog(file)
}
