use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = rival_api::Args::parse();

	rival_api::run(args).await
}
