use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tilesmith::config::NodeConfig;
use tilesmith::stats::StatsServer;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true)]
pub struct Subcommand {
	/// Storage node configuration (the stats section is used)
	config: PathBuf,
}

pub fn run(args: &Subcommand) -> Result<()> {
	let config = NodeConfig::from_path(&args.config).context("failed to load node configuration")?;

	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.context("building stats runtime")?;

	runtime.block_on(async {
		let server = StatsServer::bind(&format!("0.0.0.0:{}", config.stats.port)).await?;
		server.run().await
	})
}
