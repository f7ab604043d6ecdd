use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = sq_api::Args::parse();

	sq_api::run(args).await
}
