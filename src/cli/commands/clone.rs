use anyhow::Result;
use clap::Args;
use log::info;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use dashboard_cloner::audit::LogAuditSink;
use dashboard_cloner::config::Config;
use dashboard_cloner::handler::{
    CloneJob, CloneRun, JobReport, Tenant, open_collection, read_catalog_file,
};
use dashboard_cloner::sync::{DashboardCloner, MetadataUpdater};

use super::{build_client, print_json};

#[derive(Args)]
pub struct CloneCommands {
    /// CSV with columns dash_id,src_dataset_id,dest_dataset_id,dashboard_name
    #[arg(long)]
    pub catalog: PathBuf,
    /// Tenant id appended to every new dashboard name
    #[arg(long, requires = "client_name")]
    pub client_id: Option<String>,
    /// Tenant name appended to every new dashboard name
    #[arg(long, requires = "client_id")]
    pub client_name: Option<String>,
    /// Create a collection with this name and add every new dashboard to it
    #[arg(long)]
    pub collection_name: Option<String>,
}

#[derive(Args)]
pub struct CloneOneCommands {
    /// Source dashboard id
    #[arg(short, long)]
    pub dashboard: String,
    /// Dataset replacement as OLD=NEW, repeatable
    #[arg(short, long = "map", value_parser = parse_dataset_pair, required = true)]
    pub map: Vec<(String, String)>,
    /// Name of the new dashboard
    #[arg(short, long, default_value = "Cloned dashboard")]
    pub name: String,
}

fn parse_dataset_pair(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((old, new)) if !old.trim().is_empty() && !new.trim().is_empty() => {
            Ok((old.trim().to_string(), new.trim().to_string()))
        }
        _ => Err(format!("expected OLD=NEW, got '{}'", value)),
    }
}

pub async fn clone_command(args: CloneCommands, config: &Config) -> Result<()> {
    let jobs = read_catalog_file(&args.catalog)?;
    info!("Loaded {} dashboards from {:?}", jobs.len(), args.catalog);

    let client = build_client(config)?;
    let mut run = CloneRun::new(
        MetadataUpdater::new(client.clone()),
        DashboardCloner::new(client.clone(), client.clone()),
        Arc::new(LogAuditSink::default()),
    );
    if let (Some(client_id), Some(client_name)) = (args.client_id, args.client_name) {
        run = run.with_tenant(Tenant { client_id, client_name });
    }
    if let Some(name) = &args.collection_name {
        run = run.with_collection(open_collection(&client, name).await?);
    }

    let reports = run.run(jobs).await;
    finish(&reports)
}

pub async fn clone_one_command(args: CloneOneCommands, config: &Config) -> Result<()> {
    let client = build_client(config)?;
    let run = CloneRun::new(
        MetadataUpdater::new(client.clone()),
        DashboardCloner::new(client.clone(), client),
        Arc::new(LogAuditSink::default()),
    );
    let job = CloneJob {
        dashboard_id: args.dashboard,
        dashboard_name: args.name,
        dataset_map: args.map.into_iter().collect::<BTreeMap<_, _>>(),
    };

    let reports = run.run(vec![job]).await;
    finish(&reports)
}

fn finish(reports: &[JobReport]) -> Result<()> {
    print_json(&reports)?;
    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} dashboards failed to clone", failed, reports.len());
    }
    Ok(())
}
