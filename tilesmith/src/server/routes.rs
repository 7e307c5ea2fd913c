//! Route composition for the storage node.

use super::NodeState;
use super::handlers;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use std::sync::Arc;

/// Metatile containers can be large; cap uploads well above them.
const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

pub fn build_router(state: Arc<NodeState>) -> Router {
	Router::new()
		.route("/_stats.json", get(handlers::stats_json))
		.route("/_stats.html", get(handlers::stats_html))
		.route(
			"/{version}/{style}/{z}/{x}/{y_ext}",
			get(handlers::get_tile).post(handlers::post_tile),
		)
		.layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
		.with_state(state)
}
