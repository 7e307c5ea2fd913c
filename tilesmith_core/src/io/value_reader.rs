use anyhow::{Result, ensure};
use byteorder::{ByteOrder, LittleEndian};

/// Reads little-endian primitives from a byte slice while tracking a
/// position. Reads past the end fail instead of panicking, which lets the
/// container reader treat truncated buffers as a normal stop condition.
pub struct ValueReaderSlice<'a> {
	data: &'a [u8],
	position: usize,
}

impl<'a> ValueReaderSlice<'a> {
	pub fn new(data: &'a [u8]) -> ValueReaderSlice<'a> {
		ValueReaderSlice { data, position: 0 }
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn position(&self) -> usize {
		self.position
	}

	pub fn remaining(&self) -> usize {
		self.data.len().saturating_sub(self.position)
	}

	pub fn set_position(&mut self, position: usize) -> Result<()> {
		ensure!(
			position <= self.data.len(),
			"position {position} beyond end of {} byte buffer",
			self.data.len()
		);
		self.position = position;
		Ok(())
	}

	fn take(&mut self, length: usize) -> Result<&'a [u8]> {
		ensure!(
			self.remaining() >= length,
			"cannot read {length} bytes, only {} remaining",
			self.remaining()
		);
		let slice = &self.data[self.position..self.position + length];
		self.position += length;
		Ok(slice)
	}

	pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
		self.take(length)
	}

	pub fn read_i32(&mut self) -> Result<i32> {
		Ok(LittleEndian::read_i32(self.take(4)?))
	}

	pub fn read_u32(&mut self) -> Result<u32> {
		Ok(LittleEndian::read_u32(self.take(4)?))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_little_endian() {
		let data = [0x4Du8, 0x45, 0x54, 0x41, 0x40, 0x00, 0x00, 0x00];
		let mut reader = ValueReaderSlice::new(&data);
		assert_eq!(reader.read_bytes(4).unwrap(), b"META");
		assert_eq!(reader.read_i32().unwrap(), 64);
		assert_eq!(reader.remaining(), 0);
	}

	#[test]
	fn refuses_overruns() {
		let mut reader = ValueReaderSlice::new(&[1, 2]);
		assert!(reader.read_i32().is_err());
		assert!(reader.set_position(3).is_err());
		reader.set_position(2).unwrap();
		assert_eq!(reader.remaining(), 0);
	}
}
