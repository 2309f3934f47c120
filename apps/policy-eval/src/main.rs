use clap::Parser;
use policy_eval::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	policy_eval::run(args).await
}
