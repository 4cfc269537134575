/// Serial EEPROMs of the 24Cxx family
///
/// Protocol:
/// - Write: transmission with 1 or 2 address bytes (MSB first) followed by up
///   to a page of data. The chip buffers the data and programs it after the
///   transmission ended; during this write cycle (a few milliseconds) it
///   doesn't acknowledge anything.
/// - Read: transmission with only the address bytes to set the internal
///   address pointer, then a read request; the pointer increments with each
///   byte and rolls over at the end of the chip (not the page).
///
/// Writes running over the end of a page wrap around to the start of the
/// same page, overwriting data written before.

mod chunk;
mod detect;
mod geometry;
mod value;

use std::cmp;
use std::time::Duration;

pub use self::chunk::{
	ADDRESS_SPACE,
	Chunk,
	WriteChunks,
	check_span,
	write_chunks,
};

pub use self::detect::{
	ByteAccess,
	PROBE_COUNT,
	detect_capacity,
	probe_address,
};

pub use self::geometry::{
	AddressWidth,
	Capacity,
	Geometry,
	PAGE_SIZES,
};

use crate::bus::{
	Bus,
	ClockRate,
	Completion,
	DeviceAddress,
	ProgramTransmission,
	Transmission,
	request,
};
use crate::error::EepromError;

pub const DEFAULT_WRITE_TIME_US: u32 = 5000;
/// `set_write_time` only accepts values above this
pub const MIN_WRITE_TIME_US: u32 = 1000;

// where the payload of a write transaction comes from
#[derive(Clone, Copy)]
enum Source<'a> {
	// consecutive slices
	Buffer(&'a [u8]),
	// the same (page sized) buffer for every chunk
	Repeat(&'a [u8]),
}

impl<'a> Source<'a> {
	fn payload(self, chunk: &Chunk) -> &'a [u8] {
		match self {
			Source::Buffer(data) => &data[chunk.offset..chunk.offset + chunk.len],
			Source::Repeat(staging) => &staging[..chunk.len],
		}
	}
}

/// A chip on a bus
///
/// Not safe for concurrent use; while detecting the capacity the chip
/// content is temporarily modified.
pub struct Eeprom<B: Bus> {
	bus: B,
	device: DeviceAddress,
	capacity: Capacity,
	geometry: Geometry,
	transaction_size: usize,
	write_time: u32,
	write_timeouts: usize,
}

impl<B: Bus> Eeprom<B> {
	/// With `Capacity::Unknown` the capacity gets detected in `begin`.
	pub fn new(bus: B, device: DeviceAddress, capacity: Capacity) -> Self {
		let mut eeprom = Eeprom {
			bus,
			device,
			capacity,
			geometry: Geometry::for_capacity(capacity),
			transaction_size: 1,
			write_time: DEFAULT_WRITE_TIME_US,
			write_timeouts: 0,
		};
		eeprom.derive_geometry();
		eeprom
	}

	// resets page size and write time overrides
	fn derive_geometry(&mut self) {
		self.geometry = Geometry::for_capacity(self.capacity);
		self.transaction_size = self.geometry.transaction_size(self.bus.buffer_size());
		self.write_time = DEFAULT_WRITE_TIME_US;
	}

	pub fn begin(&mut self) -> crate::AResult<()> {
		self.begin_with_clock(ClockRate::default().hz())
	}

	/// Start the bus and check the chip responds.
	///
	/// Detects the capacity if it is unknown (which resets the geometry to
	/// the detected chip, including page size and write time overrides).
	pub fn begin_with_clock(&mut self, clock: u32) -> crate::AResult<()> {
		self.bus.begin()?;
		self.bus.set_clock(ClockRate::from_hz(clock));

		let device = self.device;
		{
			let bus = &mut self.bus;
			with_context!(("no EEPROM responding at {}", device), {
				Transmission::start(&mut *bus, device).finish()
			})?;
		}

		if !self.capacity.is_known() {
			let kbit = self.detect_size()?;
			self.capacity = Capacity::Kbit(kbit);
			self.derive_geometry();
			info!("{}: detected {} EEPROM, page size {}", device, self.capacity, self.geometry.page_size);
		}

		Ok(())
	}

	pub fn end(&mut self) {
		self.bus.end();
	}

	/// Run capacity detection (see `detect_capacity`); returns the capacity
	/// in kbit without changing the configured geometry.
	pub fn detect_size(&mut self) -> crate::AResult<u32> {
		detect_capacity(self)
	}

	pub fn capacity(&self) -> Capacity {
		self.capacity
	}

	pub fn device_address(&self) -> DeviceAddress {
		self.device
	}

	pub fn address_width(&self) -> AddressWidth {
		self.geometry.address_width
	}

	pub fn page_size(&self) -> usize {
		self.geometry.page_size
	}

	pub fn set_page_size(&mut self, page_size: usize) -> crate::AResult<()> {
		if !PAGE_SIZES.contains(&page_size) {
			return Err(EepromError::InvalidPageSize(page_size).into());
		}
		self.geometry.page_size = page_size;
		self.transaction_size = self.geometry.transaction_size(self.bus.buffer_size());
		Ok(())
	}

	/// maximum payload per transaction
	pub fn transaction_size(&self) -> usize {
		self.transaction_size
	}

	/// in microseconds
	pub fn write_time(&self) -> u32 {
		self.write_time
	}

	pub fn set_write_time(&mut self, write_time: u32) -> crate::AResult<()> {
		if write_time <= MIN_WRITE_TIME_US {
			return Err(EepromError::InvalidWriteTime(write_time).into());
		}
		self.write_time = write_time;
		Ok(())
	}

	/// number of writes the chip didn't finish within the write time
	pub fn write_timeouts(&self) -> usize {
		self.write_timeouts
	}

	pub fn bus(&self) -> &B {
		&self.bus
	}

	pub fn bus_mut(&mut self) -> &mut B {
		&mut self.bus
	}

	pub fn into_bus(self) -> B {
		self.bus
	}

	fn send_address(tx: &mut Transmission<B>, address_width: AddressWidth, address: u16) -> crate::AResult<()> {
		match address_width {
			AddressWidth::One => {
				tx.queue_byte(address as u8)?;
			},
			AddressWidth::Two => {
				tx.queue_byte((address >> 8) as u8)?;
				tx.queue_byte(address as u8)?;
			},
		}
		Ok(())
	}

	// set the address pointer, then request up to `target.len()` bytes
	fn read_transaction(&mut self, address: u16, target: &mut [u8]) -> crate::AResult<usize> {
		let device = self.device;
		{
			let mut tx = Transmission::start(&mut self.bus, device);
			Self::send_address(&mut tx, self.geometry.address_width, address)?;
			tx.finish()?;
		}

		let reception = request(&mut self.bus, device, target.len());
		let expected = reception.received();
		let mut received = 0;
		for (t, b) in target.iter_mut().zip(reception) {
			*t = b;
			received += 1;
		}
		trace!("{}: read 0x{:04x}+{}: received {} (announced {})", device, address, target.len(), received, expected);
		Ok(received)
	}

	/// Read into `data`; returns the number of bytes actually received.
	///
	/// Stops early when the chip delivers nothing at all.
	pub fn read(&mut self, address: u16, data: &mut [u8]) -> crate::AResult<usize> {
		check_span(address, data.len())?;

		let mut offset = 0;
		while offset < data.len() {
			let len = cmp::min(data.len() - offset, self.transaction_size);
			let chunk_address = (address as usize + offset) as u16;
			let received = self.read_transaction(chunk_address, &mut data[offset..offset + len])?;
			if received == 0 {
				debug!("{}: no data for 0x{:04x}, stopping read after {} of {} bytes",
					self.device, chunk_address, offset, data.len());
				break;
			}
			offset += received;
		}

		Ok(offset)
	}

	pub fn read_byte(&mut self, address: u16) -> crate::AResult<u8> {
		let mut data = [0u8];
		if 0 == self.read(address, &mut data)? {
			return Err(EepromError::NoData(address).into());
		}
		Ok(data[0])
	}

	// one page write plus waiting for the write cycle
	fn write_transaction(&mut self, address: u16, payload: &[u8]) -> crate::AResult<()> {
		let device = self.device;
		let address_width = self.geometry.address_width;
		let write_time = Duration::from_micros(self.write_time as u64);

		let mut tx = ProgramTransmission::start(&mut self.bus, device, write_time);
		Self::send_address(&mut tx, address_width, address)?;
		tx.queue(payload)?;
		if Completion::TimedOut == tx.finish()? {
			self.write_timeouts += 1;
		}
		trace!("{}: wrote 0x{:04x}+{}", device, address, payload.len());
		Ok(())
	}

	// aborts on the first failing transaction; earlier chunks stay written
	fn write_span(&mut self, address: u16, len: usize, source: Source) -> crate::AResult<()> {
		check_span(address, len)?;

		for chunk in write_chunks(address, len, self.geometry.page_size, self.transaction_size) {
			if let Err(e) = self.write_transaction(chunk.address, source.payload(&chunk)) {
				debug!("{}: write of {} bytes at 0x{:04x} aborted after {} bytes", self.device, len, address, chunk.offset);
				return Err(e);
			}
		}

		Ok(())
	}

	pub fn write(&mut self, address: u16, data: &[u8]) -> crate::AResult<()> {
		self.write_span(address, data.len(), Source::Buffer(data))
	}

	pub fn write_byte(&mut self, address: u16, value: u8) -> crate::AResult<()> {
		self.write(address, &[value])
	}

	/// Write `value` to `len` bytes starting at `address`.
	pub fn fill(&mut self, address: u16, value: u8, len: usize) -> crate::AResult<()> {
		let staging = vec![value; self.geometry.page_size];
		self.write_span(address, len, Source::Repeat(&staging))
	}

	/// Write `value` unless the chip already contains it; returns whether it
	/// was written.
	pub fn update(&mut self, address: u16, value: u8) -> crate::AResult<bool> {
		if self.read_byte(address)? == value {
			return Ok(false);
		}
		self.write_byte(address, value)?;
		Ok(true)
	}
}

impl<B: Bus> ByteAccess for Eeprom<B> {
	fn read_byte(&mut self, address: u16) -> crate::AResult<u8> {
		Eeprom::read_byte(self, address)
	}

	fn write_byte(&mut self, address: u16, value: u8) -> crate::AResult<()> {
		Eeprom::write_byte(self, address, value)
	}
}
