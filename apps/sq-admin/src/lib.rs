//! One-shot index maintenance against the configured Postgres and Qdrant.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use sq_service::{Backends, SmartQuoteService};

#[derive(Debug, Parser)]
#[command(
	version = sq_cli::VERSION,
	rename_all = "kebab",
	styles = sq_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE", default_value = sq_cli::DEFAULT_CONFIG_PATH)]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
	/// Reconcile the index against the products table.
	Sync,
	/// Drop and recreate the collection, then index every product.
	Recreate,
	/// Delete every indexed product, keeping the collection.
	Purge,
	/// Compare product counts in the products table and the index.
	Status,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = sq_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let backends = Backends::connect(&config).await?;
	let service = SmartQuoteService::new(config, backends);
	let output = execute(&service, args.command).await?;

	println!("{}", serde_json::to_string_pretty(&output)?);

	Ok(())
}

/// Runs `command` and returns its report as JSON.
pub async fn execute(service: &SmartQuoteService, command: Command) -> color_eyre::Result<Value> {
	let output = match command {
		Command::Sync => serde_json::to_value(service.sync_catalog().await?)?,
		Command::Recreate => serde_json::to_value(service.rebuild_index().await?)?,
		Command::Purge => serde_json::json!({ "removed": service.purge_index().await? }),
		Command::Status => serde_json::to_value(service.catalog_status().await?)?,
	};

	tracing::info!(?command, "Admin command finished.");

	Ok(output)
}
