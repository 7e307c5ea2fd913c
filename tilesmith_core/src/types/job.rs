//! The job is both the render request and the acknowledgement: the worker
//! mutates `status`, `data` and `last_modified` in place and hands the same
//! record back to the broker.

use super::{Blob, MetatileCoord, TileCoord};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Render,
	RenderBulk,
	Dirty,
	Done,
	Ignore,
}

impl JobStatus {
	pub fn as_u8(&self) -> u8 {
		match self {
			JobStatus::Render => 0,
			JobStatus::RenderBulk => 1,
			JobStatus::Dirty => 2,
			JobStatus::Done => 3,
			JobStatus::Ignore => 4,
		}
	}

	pub fn from_u8(value: u8) -> Result<JobStatus> {
		Ok(match value {
			0 => JobStatus::Render,
			1 => JobStatus::RenderBulk,
			2 => JobStatus::Dirty,
			3 => JobStatus::Done,
			4 => JobStatus::Ignore,
			_ => bail!("unknown job status {value}"),
		})
	}

	/// Dirty jobs force regeneration regardless of what storage holds.
	pub fn forces_render(&self) -> bool {
		matches!(self, JobStatus::Dirty)
	}

	/// Bulk jobs never return tile data inline; the client fetches from
	/// storage afterwards.
	pub fn is_bulk(&self) -> bool {
		matches!(self, JobStatus::RenderBulk)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
	pub gid: u64,
	#[serde(default)]
	pub clientid: String,
	#[serde(default)]
	pub priority: i32,
	pub status: JobStatus,
	pub style: String,
	pub z: u8,
	pub x: u32,
	pub y: u32,
	#[serde(default)]
	pub data: Option<Blob>,
	#[serde(default)]
	pub last_modified: u32,
}

impl Job {
	pub fn coord(&self) -> TileCoord {
		TileCoord {
			x: self.x,
			y: self.y,
			z: self.z,
		}
	}

	pub fn metatile(&self) -> MetatileCoord {
		MetatileCoord::from_tile(&self.coord())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_codes() {
		for code in 0..5 {
			assert_eq!(JobStatus::from_u8(code).unwrap().as_u8(), code);
		}
		assert!(JobStatus::from_u8(5).is_err());
	}

	#[test]
	fn json_round_trip() {
		let job = Job {
			gid: 7,
			clientid: "c1".to_string(),
			priority: 2,
			status: JobStatus::Render,
			style: "map".to_string(),
			z: 15,
			x: 19294,
			y: 24642,
			data: None,
			last_modified: 0,
		};
		let text = serde_json::to_string(&job).unwrap();
		assert_eq!(serde_json::from_str::<Job>(&text).unwrap(), job);
	}
}
