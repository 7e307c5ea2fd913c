//! HTTP client for the storage node, used by workers and the
//! storage-fronted renderer. Metatile containers are addressed by their
//! anchor tile with the `meta` extension.

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::header::LAST_MODIFIED;
use tilesmith_core::utils::{format_http_date, parse_http_date};
use tilesmith_core::{Blob, MetatileCoord};

/// A fetched metatile plus its storage-side bookkeeping.
#[derive(Debug)]
pub struct MetaHandle {
	pub blob: Blob,
	pub last_modified: i64,
}

impl MetaHandle {
	/// Expired tiles are reported with an epoch `Last-Modified` so upstream
	/// caches treat them as stale.
	pub fn expired(&self) -> bool {
		self.last_modified <= 0
	}
}

pub struct StorageClient {
	client: reqwest::Client,
	base_url: String,
	version: String,
}

impl StorageClient {
	pub fn new(base_url: &str, version: &str) -> StorageClient {
		StorageClient {
			client: reqwest::Client::new(),
			base_url: base_url.trim_end_matches('/').to_string(),
			version: version.to_string(),
		}
	}

	fn meta_url(&self, style: &str, coord: &MetatileCoord) -> String {
		format!(
			"{}/{}/{}/{}/{}/{}.meta",
			self.base_url, self.version, style, coord.z, coord.x, coord.y
		)
	}

	/// Fetches the whole metatile container. `Ok(None)` means storage does
	/// not hold it; transport failures are errors.
	pub async fn get_meta(&self, style: &str, coord: &MetatileCoord) -> Result<Option<MetaHandle>> {
		let url = self.meta_url(style, coord);
		let response = self
			.client
			.get(&url)
			.send()
			.await
			.with_context(|| format!("GET {url}"))?;

		match response.status() {
			StatusCode::OK => {}
			StatusCode::NOT_FOUND => return Ok(None),
			status => bail!("GET {url} answered {status}"),
		}

		let last_modified = response
			.headers()
			.get(LAST_MODIFIED)
			.and_then(|value| value.to_str().ok())
			.and_then(|text| parse_http_date(text).ok())
			.unwrap_or(0);

		let bytes = response.bytes().await.with_context(|| format!("reading {url}"))?;
		debug!("fetched metatile {coord:?} style '{style}' ({} bytes)", bytes.len());

		Ok(Some(MetaHandle {
			blob: Blob::from(bytes.to_vec()),
			last_modified,
		}))
	}

	/// Stores a metatile container. Failures are reported but the caller
	/// decides whether they matter: the cluster keeps working when storage
	/// is down because tile data still flows back through the broker.
	pub async fn put_meta(
		&self,
		style: &str,
		coord: &MetatileCoord,
		blob: &Blob,
		last_modified: Option<i64>,
	) -> Result<()> {
		let url = self.meta_url(style, coord);
		let filename = format!("{}/{}/{}.meta", coord.z, coord.x, coord.y);
		let part = reqwest::multipart::Part::bytes(blob.as_slice().to_vec())
			.file_name(filename)
			.mime_str("application/octet-stream")?;
		let form = reqwest::multipart::Form::new().part("file", part);

		let mut request = self.client.post(&url).multipart(form);
		if let Some(ts) = last_modified {
			request = request.header(LAST_MODIFIED, format_http_date(ts)?);
		}

		let response = request.send().await.with_context(|| format!("POST {url}"))?;
		if !response.status().is_success() {
			warn!("storage answered {} for {url}", response.status());
			bail!("POST {url} answered {}", response.status());
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tilesmith_core::TileCoord;

	#[test]
	fn urls_use_the_metatile_anchor() {
		let client = StorageClient::new("http://storage:8080/", "v1");
		let coord = MetatileCoord::from_tile(&TileCoord::new(15, 19294, 24642).unwrap());
		assert_eq!(
			client.meta_url("map", &coord),
			"http://storage:8080/v1/map/15/19288/24640.meta"
		);
	}

	#[test]
	fn fresh_handles_are_not_expired() {
		let handle = MetaHandle {
			blob: Blob::from("x"),
			last_modified: 1_600_000_000,
		};
		assert!(!handle.expired());

		let stale = MetaHandle {
			blob: Blob::from("x"),
			last_modified: 0,
		};
		assert!(stale.expired());
	}
}
