use anyhow::{Context, Result};
use clap::Args;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use tilesmith::config::{QueueConfig, WorkerConfig};
use tilesmith::worker::{TcpBroker, Worker};
use tilesmith_container::StorageClient;
use tilesmith_render::coverage::CoverageIndex;
use tilesmith_render::{FactoryDependencies, RendererFactory};
use uuid::Uuid;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true)]
pub struct Subcommand {
	/// Worker configuration (styles, storage, formats)
	worker_config: PathBuf,

	/// Queue configuration (broker address)
	queue_config: PathBuf,

	/// Worker id; generated when omitted
	worker_id: Option<String>,
}

pub fn run(args: &Subcommand) -> Result<()> {
	let config = WorkerConfig::from_path(&args.worker_config)
		.context("failed to load worker configuration")?;
	let queue = QueueConfig::from_path(&args.queue_config)
		.context("failed to load queue configuration")?;
	let worker_id = args
		.worker_id
		.clone()
		.unwrap_or_else(|| Uuid::new_v4().to_string());

	// one cooperative loop per process; parallelism comes from running one
	// worker process per core
	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.context("building worker runtime")?;

	runtime.block_on(async {
		let storage = Arc::new(StorageClient::new(&config.storage.url, &config.storage.version));

		let coverage = match &config.coverages.catalog {
			Some(catalog) => Some(Arc::new(
				CoverageIndex::from_catalog(catalog).context("failed to load coverages")?,
			)),
			None => None,
		};

		let deps = FactoryDependencies {
			storage: storage.clone(),
			coverage,
			vector_engine: None,
			tiling_engine: None,
		};
		let factory_config = config.to_factory_config()?;
		let factory = RendererFactory::new(&factory_config, &deps)
			.context("failed to load renderer configuration")?;

		let broker = Arc::new(TcpBroker::new(&queue.address, &worker_id));
		let worker = Worker::new(
			broker,
			storage,
			factory.registry(),
			factory_config.formats,
			factory_config.format_options,
			config.worker.memory_limit_bytes,
		);

		info!("worker {worker_id} starting");
		worker.run().await
	})
}
