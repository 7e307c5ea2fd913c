use anyhow::{Context, Result, ensure};
use clap::Args;
use std::path::PathBuf;
use tilesmith::config::NodeConfig;
use tilesmith::expiry::ExpiryServer;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true)]
pub struct Subcommand {
	/// Storage node configuration (the expiry section is used)
	config: PathBuf,
}

pub fn run(args: &Subcommand) -> Result<()> {
	let config = NodeConfig::from_path(&args.config).context("failed to load node configuration")?;
	let directory = config.expiry.directory.clone();
	ensure!(
		directory.is_some(),
		"expiry.directory must be set to run the expiry server"
	);
	let directory: PathBuf = directory.unwrap();

	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.context("building expiry runtime")?;

	runtime.block_on(async {
		let server = ExpiryServer::bind(
			&format!("0.0.0.0:{}", config.expiry.port),
			&directory,
			config.expiry.max_z,
		)
		.await?;
		server.run().await
	})
}
