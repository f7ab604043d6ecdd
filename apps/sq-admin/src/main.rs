use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = sq_admin::Args::parse();

	sq_admin::run(args).await
}
