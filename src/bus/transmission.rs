use std::ops::{
	Deref,
	DerefMut,
};
use std::time::{
	Duration,
	Instant,
};

use super::{
	Bus,
	DeviceAddress,
};

/// How the wait for a write cycle ended
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Completion {
	Acknowledged,
	TimedOut,
}

/// An open transmission; dropping it without `finish` still closes it (and
/// ignores the result).
pub struct Transmission<'a, B: ?Sized + Bus + 'a> {
	bus: &'a mut B,
	device: DeviceAddress,
	open: bool,
}

impl<'a, B: ?Sized + Bus> Transmission<'a, B> {
	pub fn start(bus: &'a mut B, device: DeviceAddress) -> Self {
		bus.begin_transmission(device);
		Transmission {
			bus,
			device,
			open: true,
		}
	}

	pub fn device(&self) -> DeviceAddress {
		self.device
	}

	pub fn queue(&mut self, data: &[u8]) -> crate::AResult<()> {
		let queued = self.bus.write_bytes(data);
		ensure!(queued == data.len(),
			"transmit buffer overflow for {}: queued {} of {} bytes", self.device, queued, data.len()
		);
		Ok(())
	}

	pub fn queue_byte(&mut self, data: u8) -> crate::AResult<()> {
		self.queue(&[data])
	}

	fn close(&mut self) -> crate::AResult<()> {
		self.open = false;
		self.bus.end_transmission()
	}

	pub fn finish(mut self) -> crate::AResult<()> {
		self.close()
	}
}

impl<'a, B: ?Sized + Bus> Drop for Transmission<'a, B> {
	fn drop(&mut self) {
		if self.open {
			let _ = self.close();
		}
	}
}

/// Transmission which programs the device: after closing it waits until the
/// device finished its internal write cycle (or the write time elapsed).
pub struct ProgramTransmission<'a, B: ?Sized + Bus + 'a> {
	tx: Transmission<'a, B>,
	write_time: Duration,
	finished: bool,
}

impl<'a, B: ?Sized + Bus> ProgramTransmission<'a, B> {
	pub fn start(bus: &'a mut B, device: DeviceAddress, write_time: Duration) -> Self {
		ProgramTransmission {
			tx: Transmission::start(bus, device),
			write_time,
			finished: false,
		}
	}

	// the transmission result decides success; the wait is only bounded
	fn complete(&mut self) -> crate::AResult<Completion> {
		self.finished = true;
		let result = self.tx.close();
		let device = self.tx.device();
		let completion = wait_for_completion(&mut *self.tx.bus, device, self.write_time);
		result.map(|()| completion)
	}

	pub fn finish(mut self) -> crate::AResult<Completion> {
		self.complete()
	}
}

impl<'a, B: ?Sized + Bus> Deref for ProgramTransmission<'a, B> {
	type Target = Transmission<'a, B>;

	fn deref(&self) -> &Self::Target {
		&self.tx
	}
}

impl<'a, B: ?Sized + Bus> DerefMut for ProgramTransmission<'a, B> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.tx
	}
}

impl<'a, B: ?Sized + Bus> Drop for ProgramTransmission<'a, B> {
	fn drop(&mut self) {
		if !self.finished {
			let _ = self.complete();
		}
	}
}

/// Poll the device with empty transmissions until it acknowledges again.
///
/// Devices don't respond during their internal write cycle. Gives up after
/// `timeout`; pauses the bus between attempts.
pub fn wait_for_completion<B>(bus: &mut B, device: DeviceAddress, timeout: Duration) -> Completion
where
	B: ?Sized + Bus,
{
	let start = Instant::now();
	let mut polls = 0usize;
	loop {
		polls += 1;
		bus.begin_transmission(device);
		if bus.end_transmission().is_ok() {
			trace!("{}: write cycle complete after {} polls", device, polls);
			return Completion::Acknowledged;
		}
		if start.elapsed() > timeout {
			warn!("{}: no acknowledge within {:?} after write ({} polls)", device, timeout, polls);
			return Completion::TimedOut;
		}
		bus.pause();
	}
}

/// Bytes received for a read request
pub struct Reception<'a, B: ?Sized + Bus + 'a> {
	bus: &'a mut B,
	received: usize,
}

impl<'a, B: ?Sized + Bus> Reception<'a, B> {
	/// number of bytes the device delivered
	pub fn received(&self) -> usize {
		self.received
	}
}

impl<'a, B: ?Sized + Bus> Iterator for Reception<'a, B> {
	type Item = u8;

	fn next(&mut self) -> Option<Self::Item> {
		if !self.bus.available() {
			return None;
		}
		self.bus.read_byte()
	}
}

pub fn request<B>(bus: &mut B, device: DeviceAddress, len: usize) -> Reception<'_, B>
where
	B: ?Sized + Bus,
{
	let received = bus.request_from(device, len);
	Reception {
		bus,
		received,
	}
}
