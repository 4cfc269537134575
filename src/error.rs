use crate::bus::DeviceAddress;

#[derive(Debug, Fail)]
pub enum EepromError {
	/// A transaction was not acknowledged (no device, or still busy)
	#[fail(display = "device {} did not acknowledge: {}", device, reason)]
	Transport {
		device: DeviceAddress,
		reason: String,
	},

	#[fail(display = "invalid page size {} (supported: 8, 16, 32, 64, 128)", _0)]
	InvalidPageSize(usize),

	#[fail(display = "write time of {}µs is not above the 1000µs minimum", _0)]
	InvalidWriteTime(u32),

	#[fail(display = "capacity detection failed: {}", _0)]
	Detection(String),

	#[fail(display = "{} bytes at 0x{:04x} exceed the 16-bit address space", len, address)]
	AddressRange {
		address: u16,
		len: usize,
	},

	#[fail(display = "no data received for address 0x{:04x}", _0)]
	NoData(u16),
}

impl EepromError {
	/// Find an `EepromError` in the cause chain of `error`.
	///
	/// Errors may be wrapped with additional context on their way up, so a
	/// plain `downcast_ref` on the outermost error is not enough.
	pub fn find(error: &failure::Error) -> Option<&EepromError> {
		error.iter_chain().filter_map(|f| f.downcast_ref::<EepromError>()).next()
	}
}
