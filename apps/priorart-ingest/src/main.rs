use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = priorart_ingest::Args::parse();

	priorart_ingest::run(args).await
}
