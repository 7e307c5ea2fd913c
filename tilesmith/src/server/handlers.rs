//! Request handlers for the storage node.

use super::error::NodeError;
use super::NodeState;
use anyhow::anyhow;
use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_TYPE, LAST_MODIFIED};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use log::debug;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tilesmith_container::TileId;
use tilesmith_core::utils::{format_http_date, parse_http_date};
use tilesmith_core::{Blob, TileCoord, content_type_for_extension};

const X_ALSO_EXPIRE: &str = "x-also-expire";

/// Parsed tile address from the request path.
#[derive(Debug, Clone)]
pub struct TileAddress {
	pub version: String,
	pub style: String,
	pub z: u8,
	pub x: u32,
	pub y: u32,
	pub ext: String,
}

impl TileAddress {
	fn id(&self) -> TileId<'_> {
		TileId {
			version: &self.version,
			style: &self.style,
			z: self.z,
			x: self.x,
			y: self.y,
			ext: &self.ext,
		}
	}

	fn with_style(&self, style: &str) -> TileAddress {
		let mut address = self.clone();
		address.style = style.to_string();
		address
	}
}

/// Parses `(version, style, z, x, y.ext)` path segments; `meta` addresses
/// use the metatile anchor as their x/y.
pub fn parse_address(
	version: &str,
	style: &str,
	z: &str,
	x: &str,
	y_ext: &str,
) -> Result<TileAddress, NodeError> {
	let (y, ext) = y_ext
		.split_once('.')
		.ok_or_else(|| NodeError::InvalidInput(format!("no extension in '{y_ext}'")))?;

	let parse = |what: &str, text: &str| {
		text
			.parse::<u32>()
			.map_err(|_| NodeError::InvalidInput(format!("bad {what} '{text}'")))
	};
	let z = parse("zoom", z)?;
	let x = parse("x", x)?;
	let y = parse("y", y)?;

	let z = u8::try_from(z).map_err(|_| NodeError::InvalidInput(format!("bad zoom '{z}'")))?;
	let coord = TileCoord { x, y, z };
	if !coord.is_valid() {
		return Err(NodeError::InvalidInput(format!("coordinates {coord:?} out of range")));
	}

	Ok(TileAddress {
		version: version.to_string(),
		style: style.to_string(),
		z,
		x,
		y,
		ext: ext.to_string(),
	})
}

fn now_unix() -> i64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0)
}

fn elapsed_micros(start: Instant) -> u32 {
	u32::try_from(start.elapsed().as_micros()).unwrap_or(u32::MAX)
}

fn check_version(state: &NodeState, address: &TileAddress) -> Result<(), NodeError> {
	if state.versions.iter().any(|v| v == &address.version) {
		Ok(())
	} else {
		// an unconfigured cache root reads as disk trouble, like a
		// misconfigured mount
		Err(NodeError::Disk(anyhow!(
			"cache not configured for version '{}'",
			address.version
		)))
	}
}

/// The `Last-Modified` to report: the epoch when the expiry bit says the
/// metatile is stale, the file mtime otherwise. An unanswered expiry query
/// falls back to the file mtime.
fn last_modified_time(state: &NodeState, address: &TileAddress) -> Option<i64> {
	if state.expiry.get_tile(address.x, address.y, address.z, &address.style) == Some(true) {
		return Some(0);
	}
	state.store.modified_time(&address.id())
}

/// A `Last-Modified` header on a GET re-dates the tile, and with
/// `X-Also-Expire` its companion styles too. Dating a tile to the epoch
/// marks it expired. Callers invoke this only for tiles that exist; a miss
/// never writes expiry state.
fn apply_redating(state: &NodeState, address: &TileAddress, headers: &HeaderMap) {
	let Some(seconds) = headers
		.get(LAST_MODIFIED)
		.and_then(|value| value.to_str().ok())
		.and_then(|text| parse_http_date(text).ok())
	else {
		return;
	};

	let mut styles = vec![address.style.clone()];
	if let Some(also) = headers.get(X_ALSO_EXPIRE).and_then(|value| value.to_str().ok()) {
		styles = also.split(',').map(|s| s.trim().to_string()).collect();
	}

	for style in styles {
		let also = address.with_style(&style);
		if let Err(e) = state.store.set_modified_time(&also.id(), seconds) {
			debug!("re-dating {also:?} failed: {e:#}");
		}
		let expired_ok = state
			.expiry
			.set_tile(also.x, also.y, also.z, &style, seconds == 0);
		if !expired_ok {
			log::warn!("setting expiry information for {also:?} failed");
		}
	}
}

fn tile_response(address: &TileAddress, bytes: Blob, last_modified: Option<i64>) -> Response {
	let mut response = Response::builder()
		.status(StatusCode::OK)
		.header(CONTENT_TYPE, content_type_for_extension(&address.ext));
	if let Some(seconds) = last_modified {
		if let Ok(date) = format_http_date(seconds) {
			response = response.header(LAST_MODIFIED, date);
		}
	}
	response
		.body(axum::body::Body::from(bytes.into_vec()))
		.unwrap_or_else(|_| StatusCode::SERVICE_UNAVAILABLE.into_response())
}

pub async fn get_tile(
	State(state): State<Arc<NodeState>>,
	Path((version, style, z, x, y_ext)): Path<(String, String, String, String, String)>,
	headers: HeaderMap,
) -> Result<Response, NodeError> {
	let address = parse_address(&version, &style, &z, &x, &y_ext)?;
	check_version(&state, &address)?;

	tokio::task::spawn_blocking(move || {
		let start = Instant::now();

		let bytes = state
			.store
			.get(&address.id())
			.map_err(NodeError::Disk)?;
		let Some(bytes) = bytes else {
			state.stats.update_get(elapsed_micros(start));
			return Err(NodeError::NotFound);
		};

		// only a confirmed hit may re-date anything; a miss must leave the
		// expiry bitmap untouched
		apply_redating(&state, &address, &headers);

		let last_modified = last_modified_time(&state, &address);
		state.stats.update_get(elapsed_micros(start));
		Ok(tile_response(&address, bytes, last_modified))
	})
	.await
	.map_err(|e| NodeError::Severe(e.into()))?
}

/// One stored part of a multipart POST.
fn store_part(
	state: &NodeState,
	address: &TileAddress,
	filename: &str,
	data: &Bytes,
	provided_time: Option<i64>,
) -> Result<(), NodeError> {
	let start = Instant::now();

	// the filename encodes `<...>/z/x/y.ext`
	let segments: Vec<&str> = filename.split('/').collect();
	if segments.len() < 3 {
		return Err(NodeError::InvalidInput(format!(
			"part filename '{filename}' does not encode z/x/y.ext"
		)));
	}
	let address = {
		let z = segments[segments.len() - 3];
		let x = segments[segments.len() - 2];
		let y_ext = segments[segments.len() - 1];
		parse_address(&address.version, &address.style, z, x, y_ext)?
	};

	state
		.store
		.put(&address.id(), &Blob::from(data.to_vec()))
		.map_err(NodeError::Disk)?;
	state.stats.update_post(elapsed_micros(start));

	let seconds = provided_time.unwrap_or_else(now_unix);
	debug!("adding/updating tile {address:?} at {seconds}");
	state
		.store
		.set_modified_time(&address.id(), seconds)
		.map_err(NodeError::Disk)?;

	// failure here is not serious, the mtime above already took; but other
	// tiles of this metatile may still read as unexpired
	let expired_ok = state
		.expiry
		.set_tile(address.x, address.y, address.z, &address.style, seconds == 0);
	if !expired_ok {
		log::warn!("setting expiry information for {address:?} failed");
	}

	Ok(())
}

pub async fn post_tile(
	State(state): State<Arc<NodeState>>,
	Path((version, style, z, x, y_ext)): Path<(String, String, String, String, String)>,
	headers: HeaderMap,
	mut multipart: Multipart,
) -> Result<Response, NodeError> {
	let address = parse_address(&version, &style, &z, &x, &y_ext)?;
	check_version(&state, &address)?;

	let provided_time = headers
		.get(LAST_MODIFIED)
		.and_then(|value| value.to_str().ok())
		.and_then(|text| parse_http_date(text).ok());

	while let Some(field) = multipart
		.next_field()
		.await
		.map_err(|e| NodeError::InvalidInput(format!("bad multipart body: {e}")))?
	{
		if !field.name().unwrap_or_default().contains("file") {
			continue;
		}
		let filename = field.file_name().unwrap_or_default().to_string();
		let data = field
			.bytes()
			.await
			.map_err(|e| NodeError::InvalidInput(format!("bad multipart part: {e}")))?;

		let state = state.clone();
		let part_address = address.clone();
		tokio::task::spawn_blocking(move || {
			store_part(&state, &part_address, &filename, &data, provided_time)
		})
		.await
		.map_err(|e| NodeError::Severe(e.into()))??;
	}

	let state_for_time = state.clone();
	let address_for_time = address.clone();
	let last_modified =
		tokio::task::spawn_blocking(move || last_modified_time(&state_for_time, &address_for_time))
			.await
			.map_err(|e| NodeError::Severe(e.into()))?;

	let mut response = Response::builder().status(StatusCode::OK);
	if let Some(seconds) = last_modified {
		if let Ok(date) = format_http_date(seconds) {
			response = response.header(LAST_MODIFIED, date);
		}
	}
	response
		.body(axum::body::Body::empty())
		.map_err(|e| NodeError::Severe(e.into()))
}

pub async fn stats_json(State(state): State<Arc<NodeState>>) -> Result<Response, NodeError> {
	let snapshot = fetch_snapshot(&state).await?;
	Ok((
		StatusCode::OK,
		[(CONTENT_TYPE, "application/json;charset=UTF-8")],
		snapshot.to_string(),
	)
		.into_response())
}

pub async fn stats_html(State(state): State<Arc<NodeState>>) -> Result<Response, NodeError> {
	let snapshot = fetch_snapshot(&state).await?;

	let mut rows = String::new();
	for table in ["gets", "posts"] {
		for window in snapshot[table].as_array().cloned().unwrap_or_default() {
			rows.push_str(&format!(
				"<tr><td>{table}</td><td>{}</td><td>{}</td><td>{:.1}</td><td>{:.1}</td></tr>\n",
				window["time"].as_str().unwrap_or("?"),
				window["n"],
				window["avg"].as_f64().unwrap_or(0.0),
				window["dev"].as_f64().unwrap_or(0.0),
			));
		}
	}
	let page = format!(
		"<html><head><title>storage node statistics</title></head><body>\
		 <p>get: {} post: {}</p>\
		 <table border=\"1\"><tr><th>table</th><th>window</th><th>n</th><th>avg &micro;s</th><th>dev</th></tr>\n{rows}</table>\
		 </body></html>",
		snapshot["get"].as_str().unwrap_or("?"),
		snapshot["post"].as_str().unwrap_or("?"),
	);
	Ok(Html(page).into_response())
}

async fn fetch_snapshot(state: &Arc<NodeState>) -> Result<serde_json::Value, NodeError> {
	let stats = state.stats.clone();
	tokio::task::spawn_blocking(move || stats.snapshot())
		.await
		.map_err(|e| NodeError::Severe(e.into()))?
		.map_err(|e| NodeError::Timeout(e.context("stats collector unreachable")))
}
