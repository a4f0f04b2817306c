use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = priorart_api::Args::parse();

	priorart_api::run(args).await
}
