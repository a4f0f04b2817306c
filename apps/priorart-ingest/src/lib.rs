pub mod checkpoint;
pub mod pipeline;

mod error;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use priorart_service::{Embedder, Providers};
use priorart_storage::qdrant::QdrantStore;

use crate::pipeline::IngestContext;

#[derive(Debug, Parser)]
#[command(
	version = priorart_cli::VERSION,
	rename_all = "kebab",
	styles = priorart_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Discard saved progress and rebuild the collection from scratch.
	#[arg(long)]
	pub fresh: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = priorart_config::load(&args.config)?;

	init_tracing(&config)?;

	let index = QdrantStore::new(&config.storage.qdrant)?;
	let embedder = Embedder::new(Providers::default().embedding, &config);

	embedder.probe().await?;

	let ctx = IngestContext::new(config, Arc::new(index), embedder);
	let report = ctx.run(args.fresh, priorart_cli::shutdown_signal()).await?;

	tracing::info!(report = %serde_json::to_string(&report)?, "Ingestion report.");

	Ok(())
}

fn init_tracing(config: &priorart_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	Ok(())
}
