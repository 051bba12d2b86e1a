use super::commands::clone::{CloneCommands, CloneOneCommands};
use super::commands::provision::ProvisionCommands;
use super::commands::sync::SyncCommands;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dashboard-cloner")]
#[command(about = "Clone Luzmo dashboards and dataset metadata onto new datasets")]
pub struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to this file instead of stderr (truncated on each run)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy column and hierarchy metadata for the dataset pairs in a sync message
    Sync(SyncCommands),
    /// Clone every dashboard listed in a catalog CSV
    Clone(CloneCommands),
    /// Clone a single dashboard
    CloneOne(CloneOneCommands),
    /// Make sure warehouse tables are imported as datasets
    Provision(ProvisionCommands),
}
