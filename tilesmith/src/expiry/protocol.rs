//! The expiry wire format: one fixed-size datagram per request.
//!
//! ```text
//! u64 index (big-endian) | i8 value | 1 command byte | 255-byte style
//! ```
//!
//! The style field is Pascal-style: a length byte followed by up to 254
//! bytes of name, zero-padded. Replies are `"OK"`, `"ERR"`, or a single
//! raw byte for a GET.

use anyhow::{Result, bail, ensure};

/// 8 + 1 + 1 + 255 bytes.
pub const REQUEST_LEN: usize = 265;

const STYLE_FIELD: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
	Set,
	Get,
}

impl Command {
	fn as_byte(self) -> u8 {
		match self {
			Command::Set => b'S',
			Command::Get => b'G',
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
	pub index: u64,
	pub value: i8,
	pub command: Command,
	pub style: String,
}

pub fn encode_request(index: u64, value: i8, command: Command, style: &str) -> Vec<u8> {
	let mut packet = Vec::with_capacity(REQUEST_LEN);
	packet.extend_from_slice(&index.to_be_bytes());
	packet.push(value as u8);
	packet.push(command.as_byte());

	let name = style.as_bytes();
	let length = name.len().min(STYLE_FIELD - 1);
	packet.push(length as u8);
	packet.extend_from_slice(&name[..length]);
	packet.resize(REQUEST_LEN, 0);
	packet
}

pub fn decode_request(datagram: &[u8]) -> Result<Request> {
	ensure!(
		datagram.len() == REQUEST_LEN,
		"expiry request is {} bytes, expected {REQUEST_LEN}",
		datagram.len()
	);

	let index = u64::from_be_bytes(datagram[0..8].try_into().unwrap());
	let value = datagram[8] as i8;
	let command = match datagram[9] {
		b'S' => Command::Set,
		b'G' => Command::Get,
		other => bail!("unknown expiry command {other:#x}"),
	};

	let length = (datagram[10] as usize).min(STYLE_FIELD - 1);
	let style = std::str::from_utf8(&datagram[11..11 + length])
		.map_err(|e| anyhow::anyhow!("style name is not utf-8: {e}"))?
		.to_string();

	Ok(Request { index, value, command, style })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trip() {
		let packet = encode_request(42, 1, Command::Set, "map");
		assert_eq!(packet.len(), REQUEST_LEN);

		let request = decode_request(&packet).unwrap();
		assert_eq!(request.index, 42);
		assert_eq!(request.value, 1);
		assert_eq!(request.command, Command::Set);
		assert_eq!(request.style, "map");
	}

	#[test]
	fn index_is_big_endian() {
		let packet = encode_request(1, 0, Command::Get, "map");
		assert_eq!(&packet[0..8], &[0, 0, 0, 0, 0, 0, 0, 1]);
		assert_eq!(packet[9], b'G');
	}

	#[test]
	fn long_styles_truncate() {
		let long = "x".repeat(400);
		let packet = encode_request(0, 0, Command::Get, &long);
		assert_eq!(packet.len(), REQUEST_LEN);
		let request = decode_request(&packet).unwrap();
		assert_eq!(request.style.len(), 254);
	}

	#[test]
	fn short_and_garbage_packets_fail() {
		assert!(decode_request(&[0u8; 10]).is_err());
		let mut bad = encode_request(0, 0, Command::Get, "map");
		bad[9] = b'X';
		assert!(decode_request(&bad).is_err());
	}
}
