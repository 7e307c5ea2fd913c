mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<InfoLevel>,

	/// File with env_logger filter directives, overriding the verbosity flag
	#[arg(short = 'l', long, global = true, value_name = "FILE")]
	logging_config: Option<std::path::PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Run a render worker against a job broker
	Worker(tools::worker::Subcommand),

	/// Serve tiles from the storage directory via http
	StorageNode(tools::storage_node::Subcommand),

	/// Track per-metatile expiry bits over udp
	ExpiryServer(tools::expiry_server::Subcommand),

	/// Collect get/post latency statistics over udp
	StatsServer(tools::stats_server::Subcommand),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let mut logger = env_logger::Builder::new();
	logger.filter_level(cli.verbose.log_level_filter());
	if let Some(path) = &cli.logging_config {
		let directives = std::fs::read_to_string(path)
			.map_err(|e| anyhow::anyhow!("cannot read logging config {path:?}: {e}"))?;
		logger.parse_filters(directives.trim());
	}
	logger.format_timestamp(None).init();

	run(cli)
}

fn run(cli: Cli) -> Result<()> {
	match &cli.command {
		Commands::Worker(arguments) => tools::worker::run(arguments),
		Commands::StorageNode(arguments) => tools::storage_node::run(arguments),
		Commands::ExpiryServer(arguments) => tools::expiry_server::run(arguments),
		Commands::StatsServer(arguments) => tools::stats_server::run(arguments),
	}
}
