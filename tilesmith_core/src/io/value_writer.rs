use crate::types::Blob;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Appends little-endian primitives to an in-memory buffer.
#[derive(Default)]
pub struct ValueWriterBlob {
	buffer: Vec<u8>,
}

impl ValueWriterBlob {
	pub fn new() -> ValueWriterBlob {
		ValueWriterBlob { buffer: Vec::new() }
	}

	pub fn position(&self) -> u64 {
		self.buffer.len() as u64
	}

	pub fn write_slice(&mut self, data: &[u8]) {
		// Writing to a Vec cannot fail.
		self.buffer.write_all(data).unwrap();
	}

	pub fn write_i32(&mut self, value: i32) {
		self.buffer.write_i32::<LittleEndian>(value).unwrap();
	}

	pub fn write_u32(&mut self, value: u32) {
		self.buffer.write_u32::<LittleEndian>(value).unwrap();
	}

	pub fn into_blob(self) -> Blob {
		Blob::from(self.buffer)
	}
}
