//! The expiry service: a single-task event loop over one UDP socket with a
//! periodic flush. Socket handling never suspends mid-request, so requests
//! are processed strictly one at a time.

use super::index::ExpiryIndex;
use super::protocol::{Command, REQUEST_LEN, decode_request};
use anyhow::{Context, Result};
use log::{error, info};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::net::UdpSocket;

/// Seconds between flushes to disk.
const FLUSH_PERIOD: Duration = Duration::from_secs(5);

const REPLY_OK: &[u8] = b"OK";
const REPLY_ERR: &[u8] = b"ERR";

pub struct ExpiryServer {
	socket: UdpSocket,
	index: ExpiryIndex,
}

impl ExpiryServer {
	pub async fn bind(addr: &str, directory: &Path, max_z: u8) -> Result<ExpiryServer> {
		let socket = UdpSocket::bind(addr)
			.await
			.with_context(|| format!("binding expiry socket on {addr}"))?;
		let index = ExpiryIndex::open(directory, max_z)?;
		info!("running expiry information server on {}", socket.local_addr()?);
		Ok(ExpiryServer { socket, index })
	}

	pub fn local_addr(&self) -> Result<SocketAddr> {
		Ok(self.socket.local_addr()?)
	}

	/// Serves until the task is dropped; flushes every [`FLUSH_PERIOD`].
	pub async fn run(mut self) -> Result<()> {
		let mut buffer = [0u8; REQUEST_LEN + 64];
		let mut flusher = tokio::time::interval(FLUSH_PERIOD);
		flusher.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				received = self.socket.recv_from(&mut buffer) => {
					match received {
						Ok((length, peer)) => {
							let reply = self.handle(&buffer[..length]);
							if let Err(e) = self.socket.send_to(&reply, peer).await {
								error!("error replying to {peer}: {e}");
							}
						}
						Err(e) => error!("error receiving info packet: {e}"),
					}
				}
				_ = flusher.tick() => {
					self.index.flush_all();
				}
			}
		}
	}

	fn handle(&mut self, datagram: &[u8]) -> Vec<u8> {
		let request = match decode_request(datagram) {
			Ok(request) => request,
			Err(e) => {
				error!("error decoding info packet: {e:#}");
				return REPLY_ERR.to_vec();
			}
		};
		if !ExpiryIndex::accepts(&request.style) {
			return REPLY_ERR.to_vec();
		}

		match request.command {
			Command::Set => match self.index.file_mut(&request.style) {
				Ok(file) => {
					file.set_bit(request.index, request.value > 0);
					REPLY_OK.to_vec()
				}
				Err(e) => {
					error!("error opening expiry file for '{}': {e:#}", request.style);
					REPLY_ERR.to_vec()
				}
			},
			Command::Get => match self.index.file_mut(&request.style) {
				Ok(file) => match file.get_bit(request.index) {
					Some(bit) => vec![u8::from(bit)],
					None => REPLY_ERR.to_vec(),
				},
				Err(e) => {
					error!("error opening expiry file for '{}': {e:#}", request.style);
					REPLY_ERR.to_vec()
				}
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::expiry::protocol::encode_request;
	use assert_fs::TempDir;

	async fn server(dir: &Path) -> ExpiryServer {
		ExpiryServer::bind("127.0.0.1:0", dir, 20).await.unwrap()
	}

	#[tokio::test]
	async fn set_then_get() {
		let dir = TempDir::new().unwrap();
		let mut server = server(dir.path()).await;

		let reply = server.handle(&encode_request(42, 1, Command::Set, "map"));
		assert_eq!(reply, b"OK");

		let reply = server.handle(&encode_request(42, 0, Command::Get, "map"));
		assert_eq!(reply, vec![1]);

		let reply = server.handle(&encode_request(43, 0, Command::Get, "map"));
		assert_eq!(reply, vec![0]);
	}

	#[tokio::test]
	async fn malformed_and_out_of_range_answers_err() {
		let dir = TempDir::new().unwrap();
		let mut server = server(dir.path()).await;

		assert_eq!(server.handle(b"bogus"), b"ERR");
		assert_eq!(
			server.handle(&encode_request(0, 0, Command::Get, "../etc")),
			b"ERR"
		);
		assert_eq!(
			server.handle(&encode_request(u64::MAX, 0, Command::Get, "map")),
			b"ERR"
		);
		// out-of-range sets are ignored but acknowledged
		assert_eq!(
			server.handle(&encode_request(u64::MAX, 1, Command::Set, "map")),
			b"OK"
		);
	}
}
