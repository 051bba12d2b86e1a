use anyhow::{Context, Result};
use clap::Args;

use dashboard_cloner::config::Config;
use dashboard_cloner::sync::Provisioner;

use super::{build_client, print_json};

#[derive(Args)]
pub struct ProvisionCommands {
    /// Warehouse table id (`project.dataset.table`), repeatable
    #[arg(short, long = "table", required = true)]
    pub tables: Vec<String>,
}

pub async fn provision_command(args: ProvisionCommands, config: &Config) -> Result<()> {
    let account_id = config
        .provisioning
        .bigquery_account_id
        .clone()
        .context(
            "No BigQuery account id configured \
             (provisioning.bigquery_account_id or LUZMO_BQ_ACCOUNT_ID)",
        )?;
    let provisioner = Provisioner::new(
        build_client(config)?,
        account_id,
        config.provisioning.acceleration_frequency_hours,
    );

    let mut provisioned = Vec::with_capacity(args.tables.len());
    for table in &args.tables {
        provisioned.push(provisioner.ensure_dataset(table).await?);
    }
    print_json(&provisioned)
}
