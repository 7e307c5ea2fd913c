use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tilesmith::config::NodeConfig;
use tilesmith::server;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true)]
pub struct Subcommand {
	/// Storage node configuration
	config: PathBuf,
}

pub fn run(args: &Subcommand) -> Result<()> {
	let config = NodeConfig::from_path(&args.config).context("failed to load node configuration")?;

	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.context("building server runtime")?;

	runtime.block_on(server::run(&config))
}
