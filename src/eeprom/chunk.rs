use std::cmp;

use crate::error::EepromError;

/// Two address bytes reach 64 KiB
pub const ADDRESS_SPACE: usize = 0x1_0000;

pub fn check_span(address: u16, len: usize) -> crate::AResult<()> {
	if address as usize + len > ADDRESS_SPACE {
		return Err(EepromError::AddressRange { address, len }.into());
	}
	Ok(())
}

/// One bus transaction of a larger request
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Chunk {
	/// chip address
	pub address: u16,
	/// offset into the request
	pub offset: usize,
	pub len: usize,
}

/// Splits a write request at page boundaries and at the transaction size.
///
/// Chips wrap around within the page when a write runs over its end, so no
/// chunk may cross a page boundary.
#[derive(Clone, Debug)]
pub struct WriteChunks {
	address: usize,
	offset: usize,
	len: usize,
	page_size: usize,
	max_len: usize,
}

impl Iterator for WriteChunks {
	type Item = Chunk;

	fn next(&mut self) -> Option<Self::Item> {
		if self.offset >= self.len {
			return None;
		}
		let page_remaining = self.page_size - (self.address % self.page_size);
		let len = cmp::min(self.len - self.offset, cmp::min(page_remaining, self.max_len));
		let chunk = Chunk {
			address: self.address as u16,
			offset: self.offset,
			len,
		};
		self.address += len;
		self.offset += len;
		Some(chunk)
	}
}

pub fn write_chunks(address: u16, len: usize, page_size: usize, max_len: usize) -> WriteChunks {
	debug_assert!(page_size > 0);
	WriteChunks {
		address: address as usize,
		offset: 0,
		len,
		page_size,
		max_len: cmp::max(max_len, 1),
	}
}
