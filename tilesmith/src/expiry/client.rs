//! Blocking UDP client for the expiry service. Replies are expected within
//! 200 ms; on a timeout the socket is re-initialized so a late reply from a
//! previous request can never be mistaken for the current one.

use super::protocol::{Command, encode_request};
use anyhow::{Context, Result};
use log::{error, info};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Mutex;
use std::time::Duration;
use tilesmith_core::METATILE;
use tilesmith_core::morton::ZLevelIndex;

const RECV_TIMEOUT: Duration = Duration::from_millis(200);

pub struct ExpiryClient {
	socket: Mutex<UdpSocket>,
	address: SocketAddr,
	zlevels: ZLevelIndex,
}

impl ExpiryClient {
	pub fn new(host: &str, port: u16) -> Result<ExpiryClient> {
		let address = (host, port)
			.to_socket_addrs()
			.with_context(|| format!("resolving expiry server {host}:{port}"))?
			.next()
			.ok_or_else(|| anyhow::anyhow!("no address for expiry server {host}:{port}"))?;
		Ok(ExpiryClient {
			socket: Mutex::new(Self::socket_init()?),
			address,
			zlevels: ZLevelIndex::new(),
		})
	}

	fn socket_init() -> Result<UdpSocket> {
		let socket = UdpSocket::bind("0.0.0.0:0").context("binding expiry client socket")?;
		socket
			.set_read_timeout(Some(RECV_TIMEOUT))
			.context("setting expiry client timeout")?;
		info!("opened expiry client socket {:?}", socket.local_addr());
		Ok(socket)
	}

	/// One request/reply exchange. Any failure resets the socket and
	/// returns `None` so callers can fall back.
	fn basic_request(&self, packet: &[u8]) -> Option<Vec<u8>> {
		let mut guard = self.socket.lock().unwrap();
		let exchange = (|| -> Result<Vec<u8>> {
			guard.send_to(packet, self.address)?;
			let mut buffer = [0u8; 4096];
			let length = guard.recv(&mut buffer)?;
			Ok(buffer[..length].to_vec())
		})();

		match exchange {
			Ok(reply) => Some(reply),
			Err(e) => {
				error!("error talking to expiry info server: {e:#}");
				if let Ok(socket) = Self::socket_init() {
					*guard = socket;
				}
				None
			}
		}
	}

	fn meta_idx(&self, x: u32, y: u32, z: u8) -> Option<u64> {
		self.zlevels.meta_idx(x / METATILE, y / METATILE, z).ok()
	}

	/// Whether the metatile holding `(x, y, z)` is expired; `None` when the
	/// server did not answer usefully.
	pub fn get_tile(&self, x: u32, y: u32, z: u8, style: &str) -> Option<bool> {
		let idx = self.meta_idx(x, y, z)?;
		let reply = self.basic_request(&encode_request(idx, 0, Command::Get, style))?;
		match reply.as_slice() {
			[bit] => Some(*bit != 0),
			_ => None,
		}
	}

	/// Marks (or clears) the expiry bit; reports whether the server
	/// acknowledged.
	pub fn set_tile(&self, x: u32, y: u32, z: u8, style: &str, expired: bool) -> bool {
		let Some(idx) = self.meta_idx(x, y, z) else {
			return false;
		};
		let packet = encode_request(idx, i8::from(expired), Command::Set, style);
		matches!(self.basic_request(&packet).as_deref(), Some(b"OK"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn timeouts_fall_back_to_none() {
		// nothing is listening on this port
		let client = ExpiryClient::new("127.0.0.1", 9).unwrap();
		assert_eq!(client.get_tile(0, 0, 3, "map"), None);
		assert!(!client.set_tile(0, 0, 3, "map", true));
	}
}
