//! Destination dataset provisioning from warehouse tables

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::api::client::LuzmoClient;
use crate::error::{StageContext, SyncResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionedDataset {
    pub table_id: String,
    pub dataset_id: String,
    pub created: bool,
    pub acceleration_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Provisioner {
    client: LuzmoClient,
    account_id: String,
    frequency_hours: u32,
}

impl Provisioner {
    pub fn new(client: LuzmoClient, account_id: impl Into<String>, frequency_hours: u32) -> Self {
        Self {
            client,
            account_id: account_id.into(),
            frequency_hours,
        }
    }

    /// Dataset for `table_id`, importing the table when no dataset exists yet.
    ///
    /// A new dataset also gets a full-load acceleration schedule starting at
    /// today's midnight UTC. Failing to schedule it is logged, not fatal.
    pub async fn ensure_dataset(&self, table_id: &str) -> SyncResult<ProvisionedDataset> {
        let existing = self
            .client
            .find_dataset_by_source(table_id)
            .await
            .stage(format!("find dataset for {}", table_id))?;

        if let Some(dataset_id) = existing {
            info!("Table {} already imported as dataset {}", table_id, dataset_id);
            return Ok(ProvisionedDataset {
                table_id: table_id.to_string(),
                dataset_id,
                created: false,
                acceleration_id: None,
            });
        }

        let dataset_id = self
            .client
            .create_dataset_provider(&self.account_id, table_id)
            .await
            .stage(format!("import table {}", table_id))?;
        info!("Imported table {} as dataset {}", table_id, dataset_id);

        let acceleration_id = match self.schedule_acceleration(&dataset_id).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Dataset {} has no acceleration schedule: {}", dataset_id, e);
                None
            }
        };

        Ok(ProvisionedDataset {
            table_id: table_id.to_string(),
            dataset_id,
            created: true,
            acceleration_id,
        })
    }

    pub async fn schedule_acceleration(&self, dataset_id: &str) -> SyncResult<String> {
        let started_at = start_of_day(Utc::now());
        let acceleration_id = self
            .client
            .create_acceleration(&started_at, self.frequency_hours)
            .await
            .stage("create acceleration")?;
        self.client
            .associate_acceleration(&acceleration_id, dataset_id)
            .await
            .stage(format!("associate acceleration {}", acceleration_id))?;
        Ok(acceleration_id)
    }
}

/// Midnight of the given instant's UTC day, as `YYYY-MM-DDTHH:MM:SS.000Z`
pub fn start_of_day(now: DateTime<Utc>) -> String {
    format!("{}T00:00:00.000Z", now.format("%Y-%m-%d"))
}
