//! Error → status code mapping for the storage node.
//!
//! Bad coordinates are the client's fault (403), a missing tile is normal
//! (404), an unreachable stats collector is an upstream timeout (408),
//! disk trouble is a bad gateway to the filesystem (502), and anything
//! unexpected is a 503 so load balancers fail over.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;

#[derive(Debug)]
pub enum NodeError {
	InvalidInput(String),
	NotFound,
	Timeout(anyhow::Error),
	Disk(anyhow::Error),
	Severe(anyhow::Error),
}

impl IntoResponse for NodeError {
	fn into_response(self) -> Response {
		let status = match &self {
			NodeError::InvalidInput(message) => {
				error!("tile request failed for invalid values: {message}");
				StatusCode::FORBIDDEN
			}
			NodeError::NotFound => StatusCode::NOT_FOUND,
			NodeError::Timeout(e) => {
				error!("timeout error: {e:#}");
				StatusCode::REQUEST_TIMEOUT
			}
			NodeError::Disk(e) => {
				error!("disk error: {e:#}");
				StatusCode::BAD_GATEWAY
			}
			NodeError::Severe(e) => {
				error!("severe error: {e:#}");
				StatusCode::SERVICE_UNAVAILABLE
			}
		};
		status.into_response()
	}
}

impl From<anyhow::Error> for NodeError {
	fn from(e: anyhow::Error) -> NodeError {
		NodeError::Severe(e)
	}
}
