//! The job/ack contract with the broker. The broker itself is an external
//! service; workers only fetch jobs and hand the mutated job record back.
//!
//! Transient "deadlock" conditions are reported by the broker in its error
//! text; they are retried by the worker loop, all other transport errors
//! propagate.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::info;
use serde_json::json;
use tilesmith_core::Job;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

#[async_trait]
pub trait Broker: Send + Sync {
	/// Blocks until the broker hands out a job.
	async fn fetch(&self) -> Result<Job>;

	/// Returns the job, acting as the acknowledgement.
	async fn notify(&self, job: &Job) -> Result<()>;
}

/// Whether a broker error is the transient deadlock condition.
pub fn is_deadlock(error: &anyhow::Error) -> bool {
	format!("{error:#}").to_lowercase().contains("deadlock")
}

type Connection = (BufReader<OwnedReadHalf>, OwnedWriteHalf);

/// JSON-lines over TCP: the worker introduces itself with a hello line,
/// then jobs and acks flow as one JSON document per line.
pub struct TcpBroker {
	address: String,
	worker_id: String,
	connection: Mutex<Option<Connection>>,
}

impl TcpBroker {
	pub fn new(address: &str, worker_id: &str) -> TcpBroker {
		TcpBroker {
			address: address.to_string(),
			worker_id: worker_id.to_string(),
			connection: Mutex::new(None),
		}
	}

	async fn connect(&self) -> Result<Connection> {
		let stream = TcpStream::connect(&self.address)
			.await
			.with_context(|| format!("connecting to broker {}", self.address))?;
		info!("connected to broker {}", self.address);
		let (read, mut write) = stream.into_split();

		let hello = json!({ "worker_id": self.worker_id }).to_string() + "\n";
		write
			.write_all(hello.as_bytes())
			.await
			.context("introducing worker to broker")?;

		Ok((BufReader::new(read), write))
	}

	async fn ensure_connected<'a>(
		&self,
		guard: &'a mut Option<Connection>,
	) -> Result<&'a mut Connection> {
		if guard.is_none() {
			*guard = Some(self.connect().await?);
		}
		Ok(guard.as_mut().unwrap())
	}
}

#[async_trait]
impl Broker for TcpBroker {
	async fn fetch(&self) -> Result<Job> {
		let mut guard = self.connection.lock().await;
		let result = async {
			let connection = self.ensure_connected(&mut guard).await?;
			let reader = &mut connection.0;
			let mut line = String::new();
			let read = reader.read_line(&mut line).await.context("reading job")?;
			if read == 0 {
				bail!("broker {} closed the connection", self.address);
			}
			serde_json::from_str::<Job>(line.trim()).context("parsing job")
		}
		.await;

		if result.is_err() {
			*guard = None;
		}
		result
	}

	async fn notify(&self, job: &Job) -> Result<()> {
		let mut guard = self.connection.lock().await;
		let result = async {
			let connection = self.ensure_connected(&mut guard).await?;
			let writer = &mut connection.1;
			let mut line = serde_json::to_string(job).context("serializing job")?;
			line.push('\n');
			writer.write_all(line.as_bytes()).await.context("sending ack")?;
			writer.flush().await.context("flushing ack")?;
			Ok(())
		}
		.await;

		if result.is_err() {
			*guard = None;
		}
		result
	}
}

/// In-process broker for tests and embedding: jobs in, acks out.
pub struct ChannelBroker {
	jobs: Mutex<tokio::sync::mpsc::UnboundedReceiver<Job>>,
	acks: tokio::sync::mpsc::UnboundedSender<Job>,
}

impl ChannelBroker {
	pub fn new() -> (
		ChannelBroker,
		tokio::sync::mpsc::UnboundedSender<Job>,
		tokio::sync::mpsc::UnboundedReceiver<Job>,
	) {
		let (job_tx, job_rx) = tokio::sync::mpsc::unbounded_channel();
		let (ack_tx, ack_rx) = tokio::sync::mpsc::unbounded_channel();
		(
			ChannelBroker {
				jobs: Mutex::new(job_rx),
				acks: ack_tx,
			},
			job_tx,
			ack_rx,
		)
	}
}

#[async_trait]
impl Broker for ChannelBroker {
	async fn fetch(&self) -> Result<Job> {
		self
			.jobs
			.lock()
			.await
			.recv()
			.await
			.ok_or_else(|| anyhow::anyhow!("job queue closed"))
	}

	async fn notify(&self, job: &Job) -> Result<()> {
		self
			.acks
			.send(job.clone())
			.map_err(|_| anyhow::anyhow!("ack queue closed"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn deadlock_detection_is_case_insensitive() {
		assert!(is_deadlock(&anyhow::anyhow!("resource DEADLOCK avoided")));
		assert!(!is_deadlock(&anyhow::anyhow!("connection refused")));
	}

	#[tokio::test]
	async fn channel_broker_round_trips() {
		let (broker, jobs, mut acks) = ChannelBroker::new();
		let job = Job {
			gid: 1,
			clientid: String::new(),
			priority: 0,
			status: tilesmith_core::JobStatus::Render,
			style: "map".to_string(),
			z: 3,
			x: 1,
			y: 2,
			data: None,
			last_modified: 0,
		};
		jobs.send(job.clone()).unwrap();

		let fetched = broker.fetch().await.unwrap();
		assert_eq!(fetched, job);

		broker.notify(&fetched).await.unwrap();
		assert_eq!(acks.recv().await.unwrap(), job);

		drop(jobs);
		assert!(broker.fetch().await.is_err());
	}
}
