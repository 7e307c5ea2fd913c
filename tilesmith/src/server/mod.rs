//! The storage node: GET/POST tile bytes over a hashed directory layout,
//! with expiry-aware `Last-Modified` handling and latency reporting.

mod error;
mod handlers;
mod routes;

pub use error::NodeError;
pub use routes::build_router;

use crate::config::NodeConfig;
use crate::expiry::ExpiryClient;
use crate::stats::StatsClient;
use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;
use tilesmith_container::TileStore;
use tokio::net::TcpListener;

pub struct NodeState {
	pub store: TileStore,
	pub versions: Vec<String>,
	pub expiry: Arc<ExpiryClient>,
	pub stats: Arc<StatsClient>,
}

impl NodeState {
	pub fn from_config(config: &NodeConfig) -> Result<NodeState> {
		Ok(NodeState {
			store: TileStore::new(&config.root),
			versions: config.versions.clone(),
			expiry: Arc::new(ExpiryClient::new(&config.expiry.host, config.expiry.port)?),
			stats: Arc::new(StatsClient::new(&config.stats.host, config.stats.port)?),
		})
	}
}

pub async fn run(config: &NodeConfig) -> Result<()> {
	let state = Arc::new(NodeState::from_config(config)?);
	let router = build_router(state);

	let listener = TcpListener::bind(&config.bind)
		.await
		.with_context(|| format!("binding storage node on {}", config.bind))?;
	info!("storage node listening on {}", listener.local_addr()?);
	axum::serve(listener, router).await.context("serving storage node")
}
