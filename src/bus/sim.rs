/*
In-memory EEPROM on a simulated bus

Behaves like a 24Cxx chip for testing and for trying the tool without
hardware:
- addresses beyond the capacity fold back onto the start of the chip,
- a write wraps around within its page when it runs over the page end,
- after a write the chip doesn't acknowledge for a number of polls,
- reads can be cut short and single writes can be made to fail.

Every transaction is recorded as a `SimEvent`.
*/

use std::collections::VecDeque;

use crate::error::EepromError;

use super::{
	Bus,
	ClockRate,
	DEFAULT_BUFFER_SIZE,
	DeviceAddress,
};

#[derive(Debug, Clone)]
pub struct SimConfig {
	pub device: DeviceAddress,
	/// in bytes, power of two
	pub size: usize,
	/// power of two
	pub page_size: usize,
	pub address_bytes: usize,
	/// polls NACKed after each write
	pub busy_polls: usize,
	pub buffer_size: usize,
	/// upper limit of bytes delivered per read request
	pub max_read: Option<usize>,
	/// NACK the n-th data write (counting from 1)
	pub fail_write: Option<usize>,
	/// acknowledge writes but don't store anything
	pub write_protect: bool,
}

impl SimConfig {
	pub fn new(size: usize, page_size: usize) -> Self {
		assert!(size.is_power_of_two(), "simulated size must be a power of two");
		assert!(page_size.is_power_of_two() && page_size <= size, "invalid simulated page size");
		SimConfig {
			device: DeviceAddress::default(),
			size,
			page_size,
			address_bytes: 2,
			busy_polls: 0,
			buffer_size: DEFAULT_BUFFER_SIZE,
			max_read: None,
			fail_write: None,
			write_protect: false,
		}
	}

	pub fn device(mut self, device: DeviceAddress) -> Self {
		self.device = device;
		self
	}

	pub fn address_bytes(mut self, address_bytes: usize) -> Self {
		assert!(address_bytes == 1 || address_bytes == 2);
		self.address_bytes = address_bytes;
		self
	}

	pub fn busy_polls(mut self, busy_polls: usize) -> Self {
		self.busy_polls = busy_polls;
		self
	}

	pub fn max_read(mut self, max_read: usize) -> Self {
		self.max_read = Some(max_read);
		self
	}

	pub fn fail_write(mut self, nth: usize) -> Self {
		self.fail_write = Some(nth);
		self
	}

	pub fn write_protect(mut self) -> Self {
		self.write_protect = true;
		self
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SimEvent {
	/// address only transmission, sets the read pointer
	Address { address: usize },
	Write { address: usize, len: usize },
	Read { address: usize, len: usize },
	/// empty transmission
	Probe { acked: bool },
	/// anything else the chip didn't acknowledge
	Nack,
}

pub struct SimulatedEeprom {
	config: SimConfig,
	memory: Vec<u8>,
	pointer: usize,
	open: bool,
	clock: Option<ClockRate>,
	tx: Option<(DeviceAddress, Vec<u8>)>,
	rx: VecDeque<u8>,
	busy: usize,
	writes: usize,
	pauses: usize,
	events: Vec<SimEvent>,
}

impl SimulatedEeprom {
	/// Fresh chip: erased to 0xff like new parts
	pub fn new(config: SimConfig) -> Self {
		let memory = vec![0xff; config.size];
		SimulatedEeprom {
			config,
			memory,
			pointer: 0,
			open: false,
			clock: None,
			tx: None,
			rx: VecDeque::new(),
			busy: 0,
			writes: 0,
			pauses: 0,
			events: Vec::new(),
		}
	}

	pub fn with_data(config: SimConfig, data: &[u8]) -> Self {
		let mut sim = Self::new(config);
		let len = std::cmp::min(data.len(), sim.memory.len());
		sim.memory[..len].copy_from_slice(&data[..len]);
		sim
	}

	pub fn config(&self) -> &SimConfig {
		&self.config
	}

	pub fn memory(&self) -> &[u8] {
		&self.memory
	}

	pub fn memory_mut(&mut self) -> &mut [u8] {
		&mut self.memory
	}

	pub fn is_open(&self) -> bool {
		self.open
	}

	pub fn clock(&self) -> Option<ClockRate> {
		self.clock
	}

	/// number of `pause` calls, i.e. unsuccessful acknowledge polls
	pub fn pauses(&self) -> usize {
		self.pauses
	}

	pub fn events(&self) -> &[SimEvent] {
		&self.events
	}

	pub fn clear_events(&mut self) {
		self.events.clear();
	}

	pub fn write_events(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
		self.events.iter().filter_map(|e| match *e {
			SimEvent::Write { address, len } => Some((address, len)),
			_ => None,
		})
	}

	pub fn read_events(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
		self.events.iter().filter_map(|e| match *e {
			SimEvent::Read { address, len } => Some((address, len)),
			_ => None,
		})
	}

	fn fold(&self, address: usize) -> usize {
		address & (self.config.size - 1)
	}

	fn nack(&mut self, device: DeviceAddress, reason: &str) -> crate::AResult<()> {
		self.events.push(SimEvent::Nack);
		Err(EepromError::Transport {
			device,
			reason: reason.into(),
		}.into())
	}

	// writes wrap around at the end of the page
	fn program(&mut self, address: usize, data: &[u8]) {
		let page_mask = self.config.page_size - 1;
		let base = address & !page_mask;
		for (i, b) in data.iter().enumerate() {
			let offset = (address + i) & page_mask;
			self.memory[base + offset] = *b;
		}
		self.pointer = self.fold(base + ((address + data.len()) & page_mask));
	}
}

impl Bus for SimulatedEeprom {
	fn begin(&mut self) -> crate::AResult<()> {
		self.open = true;
		Ok(())
	}

	fn end(&mut self) {
		self.open = false;
		self.tx = None;
		self.rx.clear();
	}

	fn set_clock(&mut self, clock: ClockRate) {
		self.clock = Some(clock);
	}

	fn begin_transmission(&mut self, device: DeviceAddress) {
		self.tx = Some((device, Vec::new()));
	}

	fn write_bytes(&mut self, data: &[u8]) -> usize {
		let buffer_size = self.config.buffer_size;
		match self.tx {
			Some((_, ref mut queued)) => {
				let fits = std::cmp::min(data.len(), buffer_size - queued.len());
				queued.extend_from_slice(&data[..fits]);
				fits
			},
			None => 0,
		}
	}

	fn end_transmission(&mut self) -> crate::AResult<()> {
		let (device, bytes) = match self.tx.take() {
			Some(tx) => tx,
			None => bail!("no transmission started"),
		};
		ensure!(self.open, "simulated bus not started");

		if device != self.config.device {
			return self.nack(device, "no such device");
		}

		if bytes.is_empty() {
			let acked = self.busy == 0;
			self.events.push(SimEvent::Probe { acked });
			if !acked {
				self.busy -= 1;
				return Err(EepromError::Transport {
					device,
					reason: "write cycle in progress".into(),
				}.into());
			}
			return Ok(());
		}

		if self.busy > 0 {
			self.busy -= 1;
			return self.nack(device, "write cycle in progress");
		}

		let address_bytes = std::cmp::min(self.config.address_bytes, bytes.len());
		let address = bytes[..address_bytes].iter().fold(0usize, |a, b| (a << 8) | (*b as usize));
		let address = self.fold(address);
		self.pointer = address;

		let data = &bytes[address_bytes..];
		if data.is_empty() {
			self.events.push(SimEvent::Address { address });
			return Ok(());
		}

		self.writes += 1;
		if self.config.fail_write == Some(self.writes) {
			return self.nack(device, "injected write failure");
		}

		if !self.config.write_protect {
			self.program(address, data);
		}
		self.busy = self.config.busy_polls;
		self.events.push(SimEvent::Write { address, len: data.len() });
		Ok(())
	}

	fn request_from(&mut self, device: DeviceAddress, len: usize) -> usize {
		self.rx.clear();
		if !self.open || device != self.config.device || self.busy > 0 {
			self.events.push(SimEvent::Nack);
			return 0;
		}

		let mut len = std::cmp::min(len, self.config.buffer_size);
		if let Some(max_read) = self.config.max_read {
			len = std::cmp::min(len, max_read);
		}

		let address = self.pointer;
		for _ in 0..len {
			self.rx.push_back(self.memory[self.pointer]);
			self.pointer = self.fold(self.pointer + 1);
		}
		self.events.push(SimEvent::Read { address, len });
		len
	}

	fn available(&mut self) -> bool {
		!self.rx.is_empty()
	}

	fn read_byte(&mut self) -> Option<u8> {
		self.rx.pop_front()
	}

	fn buffer_size(&self) -> usize {
		self.config.buffer_size
	}

	fn pause(&mut self) {
		self.pauses += 1;
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn transmit(sim: &mut SimulatedEeprom, bytes: &[u8]) -> crate::AResult<()> {
		sim.begin_transmission(DeviceAddress::default());
		assert_eq!(sim.write_bytes(bytes), bytes.len());
		sim.end_transmission()
	}

	fn receive(sim: &mut SimulatedEeprom, len: usize) -> Vec<u8> {
		let n = sim.request_from(DeviceAddress::default(), len);
		let mut result = Vec::new();
		while sim.available() {
			result.push(sim.read_byte().unwrap());
		}
		assert_eq!(n, result.len());
		result
	}

	#[test]
	fn page_write_wraps_within_page() {
		let mut sim = SimulatedEeprom::new(SimConfig::new(256, 8));
		sim.begin().unwrap();
		transmit(&mut sim, &[0x00, 0x06, 1, 2, 3, 4]).unwrap();
		assert_eq!(&sim.memory()[0..8], &[3, 4, 0xff, 0xff, 0xff, 0xff, 1, 2]);
		assert_eq!(sim.memory()[8], 0xff);
	}

	#[test]
	fn addresses_fold() {
		let mut sim = SimulatedEeprom::new(SimConfig::new(512, 16));
		sim.begin().unwrap();
		transmit(&mut sim, &[0x02, 0x05, 0xab]).unwrap();
		assert_eq!(sim.memory()[5], 0xab);
		transmit(&mut sim, &[0x00, 0x05]).unwrap();
		assert_eq!(receive(&mut sim, 1), vec![0xab]);
		// sequential reads roll over at the end of the chip
		sim.memory_mut()[511] = 0x42;
		sim.memory_mut()[0] = 0x43;
		transmit(&mut sim, &[0x01, 0xff]).unwrap();
		assert_eq!(receive(&mut sim, 2), vec![0x42, 0x43]);
	}

	#[test]
	fn busy_after_write() {
		let mut sim = SimulatedEeprom::new(SimConfig::new(256, 8).busy_polls(2));
		sim.begin().unwrap();
		transmit(&mut sim, &[0x00, 0x00, 0x01]).unwrap();
		assert!(transmit(&mut sim, &[]).is_err());
		assert!(transmit(&mut sim, &[]).is_err());
		assert!(transmit(&mut sim, &[]).is_ok());
		assert_eq!(&sim.events()[1..], &[
			SimEvent::Probe { acked: false },
			SimEvent::Probe { acked: false },
			SimEvent::Probe { acked: true },
		]);
	}

	#[test]
	fn absent_device() {
		let mut sim = SimulatedEeprom::new(SimConfig::new(256, 8));
		sim.begin().unwrap();
		sim.begin_transmission(DeviceAddress::new(0x51).unwrap());
		assert!(sim.end_transmission().is_err());
		assert_eq!(sim.request_from(DeviceAddress::new(0x51).unwrap(), 4), 0);
		sim.end();
		assert!(transmit(&mut sim, &[]).is_err(), "closed bus must not work");
	}

	#[test]
	fn buffer_limit() {
		let mut sim = SimulatedEeprom::new(SimConfig::new(256, 8));
		assert_eq!(sim.config().buffer_size, DEFAULT_BUFFER_SIZE);
		sim.begin_transmission(DeviceAddress::default());
		assert_eq!(sim.write_bytes(&[0u8; 40]), DEFAULT_BUFFER_SIZE);
		assert_eq!(sim.write_byte(0), 0);
	}
}
