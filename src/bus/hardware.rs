use std::thread;
use std::time::{
	Duration,
	Instant,
};

use super::{
	ClockRate,
	DeviceAddress,
};

/// Transaction buffer of the common two-wire controllers; on writes the
/// address bytes take up room in it too.
pub const DEFAULT_BUFFER_SIZE: usize = 32;

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

pub trait Bus {
	/// acquire the bus (idempotent)
	fn begin(&mut self) -> crate::AResult<()>;
	/// release the bus
	fn end(&mut self);

	fn set_clock(&mut self, clock: ClockRate);

	fn begin_transmission(&mut self, device: DeviceAddress);
	// queue data for the open transmission; returns how many bytes fit into
	// the buffer
	fn write_bytes(&mut self, data: &[u8]) -> usize;
	// send queued data; fails if the device didn't acknowledge
	fn end_transmission(&mut self) -> crate::AResult<()>;

	fn write_byte(&mut self, data: u8) -> usize {
		self.write_bytes(&[data])
	}

	// returns the number of bytes received; might be less than requested
	fn request_from(&mut self, device: DeviceAddress, len: usize) -> usize;
	fn available(&mut self) -> bool;
	fn read_byte(&mut self) -> Option<u8>;

	fn buffer_size(&self) -> usize {
		DEFAULT_BUFFER_SIZE
	}

	// let others run while waiting for a device
	fn pause(&mut self) {
		thread::yield_now();
	}
}

impl<'a, B: ?Sized + Bus> Bus for &'a mut B {
	fn begin(&mut self) -> crate::AResult<()> {
		B::begin(*self)
	}
	fn end(&mut self) {
		B::end(*self)
	}

	fn set_clock(&mut self, clock: ClockRate) {
		B::set_clock(*self, clock)
	}

	fn begin_transmission(&mut self, device: DeviceAddress) {
		B::begin_transmission(*self, device)
	}
	fn write_bytes(&mut self, data: &[u8]) -> usize {
		B::write_bytes(*self, data)
	}
	fn end_transmission(&mut self) -> crate::AResult<()> {
		B::end_transmission(*self)
	}

	fn write_byte(&mut self, data: u8) -> usize {
		B::write_byte(*self, data)
	}

	fn request_from(&mut self, device: DeviceAddress, len: usize) -> usize {
		B::request_from(*self, device, len)
	}
	fn available(&mut self) -> bool {
		B::available(*self)
	}
	fn read_byte(&mut self) -> Option<u8> {
		B::read_byte(*self)
	}

	fn buffer_size(&self) -> usize {
		B::buffer_size(*self)
	}

	fn pause(&mut self) {
		B::pause(*self)
	}
}
