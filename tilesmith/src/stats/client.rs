//! Fire-and-forget stats reporting plus the TCP snapshot fetch used by the
//! storage node's stats pages.

use super::window::Table;
use anyhow::{Context, Result};
use log::error;
use std::io::Read;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct StatsClient {
	socket: UdpSocket,
	address: SocketAddr,
}

impl StatsClient {
	pub fn new(host: &str, port: u16) -> Result<StatsClient> {
		let address = (host, port)
			.to_socket_addrs()
			.with_context(|| format!("resolving stats server {host}:{port}"))?
			.next()
			.ok_or_else(|| anyhow::anyhow!("no address for stats server {host}:{port}"))?;
		let socket = UdpSocket::bind("0.0.0.0:0").context("binding stats client socket")?;
		Ok(StatsClient { socket, address })
	}

	fn send(&self, table: Table, microseconds: u32) {
		let mut packet = [0u8; 5];
		packet[0] = table.as_byte();
		packet[1..5].copy_from_slice(&microseconds.to_be_bytes());
		if let Err(e) = self.socket.send_to(&packet, self.address) {
			error!("can't update stats: {e}");
		}
	}

	pub fn update_get(&self, microseconds: u32) {
		self.send(Table::Gets, microseconds);
	}

	pub fn update_post(&self, microseconds: u32) {
		self.send(Table::Posts, microseconds);
	}

	/// Fetches the collector's JSON snapshot over TCP.
	pub fn snapshot(&self) -> Result<serde_json::Value> {
		let stream = TcpStream::connect_timeout(&self.address, SNAPSHOT_TIMEOUT)
			.with_context(|| format!("connecting to stats server {}", self.address))?;
		stream.set_read_timeout(Some(SNAPSHOT_TIMEOUT))?;
		let mut body = String::new();
		let mut stream = stream;
		stream
			.read_to_string(&mut body)
			.context("reading stats snapshot")?;
		serde_json::from_str(body.trim()).context("parsing stats snapshot")
	}
}
