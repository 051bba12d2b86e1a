use anyhow::Result;
use clap::Parser;
use log::info;

mod cli;

use cli::app::{Cli, Commands};
use cli::commands::clone::{clone_command, clone_one_command};
use cli::commands::provision::provision_command;
use cli::commands::sync::sync_command;
use dashboard_cloner::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = &cli.log_file {
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        logger.target(env_logger::Target::Pipe(Box::new(log_file)));
    }
    logger.init();

    dotenvy::dotenv().ok();
    let config = Config::load(cli.config.as_deref())?;
    info!("Starting dashboard-cloner against {}", config.api.base_url);

    match cli.command {
        Commands::Sync(args) => sync_command(args, &config).await,
        Commands::Clone(args) => clone_command(args, &config).await,
        Commands::CloneOne(args) => clone_one_command(args, &config).await,
        Commands::Provision(args) => provision_command(args, &config).await,
    }
}
