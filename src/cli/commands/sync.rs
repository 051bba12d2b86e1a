use anyhow::{Context, Result};
use clap::Args;
use log::info;
use std::io::Read;
use std::path::PathBuf;

use dashboard_cloner::audit::LogAuditSink;
use dashboard_cloner::config::Config;
use dashboard_cloner::handler::handle_sync_message;
use dashboard_cloner::sync::MetadataUpdater;

use super::{build_client, print_json};

#[derive(Args)]
pub struct SyncCommands {
    /// JSON message file with a `pairs` (or `payload`) map, or `-` for stdin
    #[arg(short, long)]
    pub message: PathBuf,
}

pub async fn sync_command(args: SyncCommands, config: &Config) -> Result<()> {
    let bytes = read_message(&args.message)?;
    let updater = MetadataUpdater::new(build_client(config)?);
    let audit = LogAuditSink::default();

    let reports = handle_sync_message(&updater, &audit, &bytes).await?;
    print_json(&reports)?;

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    info!("Synced {} dataset pairs, {} with failures", reports.len(), failed);
    if failed > 0 {
        anyhow::bail!("{} of {} dataset pairs did not sync cleanly", failed, reports.len());
    }
    Ok(())
}

fn read_message(path: &PathBuf) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("Failed to read message from stdin")?;
        Ok(bytes)
    } else {
        std::fs::read(path).with_context(|| format!("Failed to read message file: {:?}", path))
    }
}
