use std::collections::VecDeque;
use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{
	Path,
	PathBuf,
};
use std::time::Duration;

use libc::{
	c_ulong,
	ioctl,
};

use crate::bus::{
	Bus,
	ClockRate,
	DEFAULT_BUFFER_SIZE,
	DeviceAddress,
	reliable_sleep,
};
use crate::error::EepromError;

// from <linux/i2c-dev.h> and <linux/i2c.h>
const I2C_RDWR: c_ulong = 0x0707;
const I2C_M_RD: u16 = 0x0001;

#[repr(C)]
struct I2cMsg {
	addr: u16,
	flags: u16,
	len: u16,
	buf: *mut u8,
}

#[repr(C)]
struct I2cRdwrIoctlData {
	msgs: *mut I2cMsg,
	nmsgs: u32,
}

// between acknowledge polls; a page write takes a few milliseconds
const POLL_INTERVAL: Duration = Duration::from_micros(100);

/// `/dev/i2c-N` character device; every transmission and read request is a
/// single `I2C_RDWR` message.
#[derive(Debug)]
pub struct I2cDev {
	path: PathBuf,
	file: Option<fs::File>,
	buffer_size: usize,
	tx: Option<(DeviceAddress, Vec<u8>)>,
	rx: VecDeque<u8>,
}

impl I2cDev {
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn open_file(&mut self) -> io::Result<()> {
		if self.file.is_none() {
			let file = fs::OpenOptions::new()
				.read(true)
				.write(true)
				.open(&self.path)?;
			self.file = Some(file);
		}
		Ok(())
	}

	fn transfer(&self, device: DeviceAddress, flags: u16, buf: &mut [u8]) -> io::Result<()> {
		let file = match self.file {
			Some(ref file) => file,
			None => return Err(io::Error::new(io::ErrorKind::NotConnected, "bus not started")),
		};
		if buf.len() > u16::max_value() as usize {
			return Err(io::Error::new(io::ErrorKind::InvalidInput, "message too long"));
		}

		let mut msg = I2cMsg {
			addr: device.get() as u16,
			flags,
			len: buf.len() as u16,
			buf: buf.as_mut_ptr(),
		};
		let mut data = I2cRdwrIoctlData {
			msgs: &mut msg,
			nmsgs: 1,
		};

		let res = unsafe {
			ioctl(file.as_raw_fd(), I2C_RDWR as _, &mut data as *mut I2cRdwrIoctlData)
		};
		if res < 0 {
			return Err(io::Error::last_os_error());
		}
		Ok(())
	}
}

impl Bus for I2cDev {
	fn begin(&mut self) -> crate::AResult<()> {
		let path = self.path.display().to_string();
		with_context!(("couldn't open I2C bus {}", path), {
			self.open_file()?;
			Ok(())
		})
	}

	fn end(&mut self) {
		self.file = None;
		self.tx = None;
		self.rx.clear();
	}

	fn set_clock(&mut self, clock: ClockRate) {
		// userspace can't change it; the adapter runs at what the kernel configured
		debug!("{}: ignoring bus clock {}, configured by the kernel driver", self.path.display(), clock);
	}

	fn begin_transmission(&mut self, device: DeviceAddress) {
		self.tx = Some((device, Vec::with_capacity(self.buffer_size)));
	}

	fn write_bytes(&mut self, data: &[u8]) -> usize {
		let buffer_size = self.buffer_size;
		match self.tx {
			Some((_, ref mut queued)) => {
				let fits = std::cmp::min(data.len(), buffer_size.saturating_sub(queued.len()));
				queued.extend_from_slice(&data[..fits]);
				fits
			},
			None => 0,
		}
	}

	fn end_transmission(&mut self) -> crate::AResult<()> {
		let (device, mut bytes) = match self.tx.take() {
			Some(tx) => tx,
			None => bail!("no transmission started"),
		};
		self.transfer(device, 0, &mut bytes).map_err(|e| {
			EepromError::Transport {
				device,
				reason: e.to_string(),
			}.into()
		})
	}

	fn request_from(&mut self, device: DeviceAddress, len: usize) -> usize {
		self.rx.clear();
		let mut buf = vec![0u8; std::cmp::min(len, self.buffer_size)];
		match self.transfer(device, I2C_M_RD, &mut buf) {
			Ok(()) => {
				self.rx.extend(buf.iter().cloned());
				buf.len()
			},
			Err(e) => {
				debug!("{}: read of {} bytes from {} failed: {}", self.path.display(), len, device, e);
				0
			},
		}
	}

	fn available(&mut self) -> bool {
		!self.rx.is_empty()
	}

	fn read_byte(&mut self) -> Option<u8> {
		self.rx.pop_front()
	}

	fn buffer_size(&self) -> usize {
		self.buffer_size
	}

	fn pause(&mut self) {
		reliable_sleep(POLL_INTERVAL);
	}
}

// TODO: exclusive open / file locking?
pub fn inner_open(path: PathBuf) -> io::Result<I2cDev> {
	let mut dev = I2cDev {
		path,
		file: None,
		buffer_size: DEFAULT_BUFFER_SIZE,
		tx: None,
		rx: VecDeque::new(),
	};
	dev.open_file()?;
	Ok(dev)
}
