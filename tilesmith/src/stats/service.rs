//! The stats collector: one event loop over a UDP ingest socket and a TCP
//! snapshot socket on the same port number. Ingest datagrams are five
//! bytes: a table character and a big-endian u32 of microseconds.

use super::window::{StatsStore, Table};
use anyhow::{Context, Result};
use log::{error, info};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, UdpSocket};

/// How often old samples are dropped.
const FLUSH_PERIOD: Duration = Duration::from_secs(5 * 60);

pub struct StatsServer {
	udp: UdpSocket,
	tcp: TcpListener,
	store: StatsStore,
}

impl StatsServer {
	pub async fn bind(addr: &str) -> Result<StatsServer> {
		let udp = UdpSocket::bind(addr)
			.await
			.with_context(|| format!("binding stats udp socket on {addr}"))?;
		let tcp = TcpListener::bind(addr)
			.await
			.with_context(|| format!("binding stats tcp socket on {addr}"))?;
		info!("running stats collection server on {}", udp.local_addr()?);
		Ok(StatsServer {
			udp,
			tcp,
			store: StatsStore::new(),
		})
	}

	pub fn local_addr(&self) -> Result<SocketAddr> {
		Ok(self.udp.local_addr()?)
	}

	pub async fn run(mut self) -> Result<()> {
		let mut buffer = [0u8; 64];
		let mut flusher = tokio::time::interval(FLUSH_PERIOD);
		flusher.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				received = self.udp.recv_from(&mut buffer) => {
					match received {
						Ok((length, peer)) => {
							if let Err(e) = self.ingest(&buffer[..length]) {
								error!("error receiving stats packet from {peer}: {e:#}");
							}
						}
						Err(e) => error!("error receiving stats packet: {e}"),
					}
				}
				accepted = self.tcp.accept() => {
					match accepted {
						Ok((mut stream, _)) => {
							let mut body = self.store.snapshot().to_string();
							body.push_str("\r\n");
							if let Err(e) = stream.write_all(body.as_bytes()).await {
								error!("error writing stats snapshot: {e}");
							}
						}
						Err(e) => error!("error accepting stats connection: {e}"),
					}
				}
				_ = flusher.tick() => {
					self.store.flush();
				}
			}
		}
	}

	fn ingest(&mut self, datagram: &[u8]) -> Result<()> {
		anyhow::ensure!(
			datagram.len() == 5,
			"stats packet is {} bytes, expected 5",
			datagram.len()
		);
		let table = Table::from_byte(datagram[0])
			.ok_or_else(|| anyhow::anyhow!("unknown stats table {:?}", datagram[0] as char))?;
		let microseconds = u32::from_be_bytes(datagram[1..5].try_into().unwrap());
		self.store.add(table, microseconds);
		Ok(())
	}
}
