use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = nlp_admin::Args::parse();
	nlp_admin::run(args).await
}
