//! The worker loop: fetch, validate, resolve, check storage, render,
//! transcode, pack, emit, ack. Single-threaded and cooperative; many
//! worker processes run side by side and coordinate only through the
//! broker, storage and the expiry service.

use super::broker::{Broker, is_deadlock};
use anyhow::{Result, anyhow, bail};
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tilesmith_container::{MetatileWriter, StorageClient};
use tilesmith_core::utils::resident_set_size;
use tilesmith_core::{Blob, FormatName, Job, JobStatus, Mercator};
use tilesmith_render::transcode::{FormatOptions, transcode, transcode_meta};
use tilesmith_render::{RenderTile, RendererRegistry};

pub struct Worker {
	broker: Arc<dyn Broker>,
	storage: Arc<StorageClient>,
	renderers: Arc<RendererRegistry>,
	formats: HashMap<String, Vec<FormatName>>,
	format_options: HashMap<FormatName, FormatOptions>,
	projection: Arc<Mercator>,
	memory_limit: Option<u64>,
}

impl Worker {
	pub fn new(
		broker: Arc<dyn Broker>,
		storage: Arc<StorageClient>,
		renderers: Arc<RendererRegistry>,
		formats: HashMap<String, Vec<FormatName>>,
		format_options: HashMap<FormatName, FormatOptions>,
		memory_limit: Option<u64>,
	) -> Worker {
		Worker {
			broker,
			storage,
			renderers,
			formats,
			format_options,
			projection: Arc::new(Mercator::new(31)),
			memory_limit,
		}
	}

	/// Runs until the broker goes away or the memory limit trips. A clean
	/// return means the supervisor should restart the process.
	pub async fn run(&self) -> Result<()> {
		loop {
			let job = match self.broker.fetch().await {
				Ok(job) => job,
				Err(e) if is_deadlock(&e) => {
					error!("deadlock error get_job: {e:#}");
					continue;
				}
				Err(e) => return Err(e),
			};

			self.handle(job).await?;

			if let (Some(limit), Some(rss)) = (self.memory_limit, resident_set_size()) {
				if rss > limit {
					warn!("memory size {rss} is more than memory limit {limit}, shutting down");
					break;
				}
			}
		}
		Ok(())
	}

	async fn notify(&self, job: &Job) -> Result<()> {
		loop {
			match self.broker.notify(job).await {
				Ok(()) => return Ok(()),
				Err(e) if is_deadlock(&e) => error!("deadlock error notify: {e:#}"),
				Err(e) => return Err(e),
			}
		}
	}

	async fn handle(&self, mut job: Job) -> Result<()> {
		info!(
			"got task: {} {} {} '{}' id={}",
			job.z, job.x, job.y, job.style, job.gid
		);

		// resolve the style before anything else; an unknown style can
		// only be ignored
		let prepared = self.prepare(&job);
		let (renderer, formats, tile) = match prepared {
			Ok(prepared) => prepared,
			Err(e) => {
				error!(
					"couldn't fulfill request for z={} x={} y={} style='{}', sending ignore. error: {e:#}",
					job.z, job.x, job.y, job.style
				);
				job.status = JobStatus::Ignore;
				return self.notify(&job).await;
			}
		};

		if !job.coord().is_valid() {
			job.status = JobStatus::Ignore;
			return self.notify(&job).await;
		}

		// cache hit: unless the client forced regeneration, a fresh stored
		// metatile short-circuits the render
		if let Some(handle) = self.existing_metatile(&job).await {
			job.last_modified = u32::try_from(handle.last_modified).unwrap_or(0);
			if !job.status.is_bulk() {
				job.data = Some(handle.blob);
			}
			info!(
				"EXISTS METATILE {}:{}:{}:{} tile-size={}",
				job.z,
				job.x,
				job.y,
				job.style,
				job.data.as_ref().map_or(0, Blob::len)
			);
			job.status = JobStatus::Ignore;
			return self.notify(&job).await;
		}

		match self.render_job(&job, renderer.as_ref(), &formats, &tile).await {
			Ok(blob) => {
				if !job.status.forces_render() && !job.status.is_bulk() {
					job.data = Some(blob);
				}
				info!(
					"DONE METATILE {}:{}:{}:{} tile-size={}",
					job.z,
					job.x,
					job.y,
					job.style,
					job.data.as_ref().map_or(0, Blob::len)
				);
				job.status = JobStatus::Done;
				job.last_modified = now_unix();
			}
			Err(e) => {
				error!("{e:#}");
				job.status = JobStatus::Ignore;
			}
		}

		self.notify(&job).await
	}

	#[allow(clippy::type_complexity)]
	fn prepare(
		&self,
		job: &Job,
	) -> Result<(
		Arc<dyn tilesmith_render::Renderer>,
		Vec<FormatName>,
		RenderTile,
	)> {
		let formats = self
			.formats
			.get(&job.style)
			.cloned()
			.ok_or_else(|| anyhow!("no formats for style '{}'", job.style))?;
		let renderer = self
			.renderers
			.renderer_for(&job.style)
			.ok_or_else(|| {
				anyhow!(
					"request for renderer '{}', which is not configured",
					job.style
				)
			})?;
		let tile = RenderTile::from_job(job, self.projection.clone())?;
		Ok((renderer, formats, tile))
	}

	/// The fresh stored metatile for this job, if the job semantics allow
	/// using it. Storage trouble reads as a miss; rendering is the
	/// fallback for everything.
	async fn existing_metatile(
		&self,
		job: &Job,
	) -> Option<tilesmith_container::MetaHandle> {
		if job.status.forces_render() {
			return None;
		}
		match self.storage.get_meta(&job.style, &job.metatile()).await {
			Ok(handle) => handle.filter(|h| !h.expired()),
			Err(e) => {
				warn!(
					"storage check failed for {}:{}:{}:{}: {e:#}",
					job.z, job.x, job.y, job.style
				);
				None
			}
		}
	}

	async fn render_job(
		&self,
		job: &Job,
		renderer: &dyn tilesmith_render::Renderer,
		formats: &[FormatName],
		tile: &RenderTile,
	) -> Result<Blob> {
		let Some(result) = renderer.process(tile).await? else {
			bail!("requested metatile could not be rendered");
		};

		let image_formats: Vec<FormatName> = formats
			.iter()
			.copied()
			.filter(|f| *f != FormatName::Json)
			.collect();
		let tiles = transcode(&result, tile.dimensions, &image_formats, &self.format_options)?;
		let meta = if formats.contains(&FormatName::Json) {
			transcode_meta(&result)?
		} else {
			None
		};

		let blob = MetatileWriter::write(
			&tile.coord(),
			tile.dimensions,
			&image_formats,
			&tiles,
			meta.as_ref(),
		)?;

		// best effort: the cluster keeps working when storage is down,
		// the data still flows back through the broker
		if let Err(e) = self
			.storage
			.put_meta(&job.style, &tile.coord(), &blob, None)
			.await
		{
			error!(
				"failed to save meta tile to storage ({}:{}:{}:{} tile-size={}): {e:#}",
				job.z,
				job.x,
				job.y,
				job.style,
				blob.len()
			);
		}

		Ok(blob)
	}
}

fn now_unix() -> u32 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs() as u32)
		.unwrap_or(0)
}
