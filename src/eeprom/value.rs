use std::mem;

use zerocopy::{
	FromBytes,
	Immutable,
	IntoBytes,
};

use super::Eeprom;
use crate::bus::Bus;

// Values are stored with their in-memory representation (native byte order),
// taking exactly `size_of::<T>()` bytes.
impl<B: Bus> Eeprom<B> {
	pub fn get<T: FromBytes + IntoBytes>(&mut self, address: u16) -> crate::AResult<T> {
		let mut value = T::new_zeroed();
		let len = self.read(address, value.as_mut_bytes())?;
		ensure!(len == mem::size_of::<T>(),
			"short read at 0x{:04x}: got {} of {} bytes", address, len, mem::size_of::<T>()
		);
		Ok(value)
	}

	pub fn put<T: IntoBytes + Immutable>(&mut self, address: u16, value: &T) -> crate::AResult<()> {
		self.write(address, value.as_bytes())
	}
}
