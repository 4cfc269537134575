use std::fmt;
use std::str;

/// 7-bit two-wire device address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceAddress(u8);

impl DeviceAddress {
	pub const MAX: u8 = 0x7f;

	pub fn new(address: u8) -> crate::AResult<Self> {
		ensure!(address <= Self::MAX, "invalid device address: 0x{:02x} (not a 7-bit address)", address);
		Ok(DeviceAddress(address))
	}

	pub fn get(self) -> u8 {
		self.0
	}
}

// base address of the 24Cxx family with all address pins tied low
impl Default for DeviceAddress {
	fn default() -> Self {
		DeviceAddress(0x50)
	}
}

impl fmt::Debug for DeviceAddress {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_tuple("DeviceAddress")
			.field(&format_args!("0x{:02x}", self.0))
			.finish()
	}
}

impl fmt::Display for DeviceAddress {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl str::FromStr for DeviceAddress {
	type Err = ::failure::Error;

	// always hex, "0x" prefix optional: 50, 0x50, 0X7f
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let digits = if s.starts_with("0x") || s.starts_with("0X") {
			&s[2..]
		} else {
			s
		};

		ensure!(!digits.is_empty() && digits.len() <= 2, "invalid device address: {:?}", s);

		let address = with_context!(("invalid device address: {:?}", s),
			u8::from_str_radix(digits, 16).map_err(|e| e.into())
		)?;

		DeviceAddress::new(address)
	}
}

#[cfg(test)]
mod test {
	use super::DeviceAddress;

	fn check_address(address: u8, repr: &str) {
		match repr.parse::<DeviceAddress>() {
			Err(e) => panic!("{} failed to parse as DeviceAddress: {}", repr, e),
			Ok(a) => assert_eq!(address, a.get(), "failed validating parsed {}", repr),
		}
	}

	fn check_address_canonical(address: u8, repr: &str) {
		check_address(address, repr);
		assert_eq!(DeviceAddress::new(address).unwrap().to_string(), repr, "failed stringifying 0x{:02x}", address);
	}

	fn check_invalid_address(repr: &str) {
		assert!(repr.parse::<DeviceAddress>().is_err(), "{:?} must not be a valid device address", repr);
	}

	#[test]
	fn parse_device_address() {
		check_address(0x50, "50");
		check_address(0x07, "7");
		check_address(0x57, "0X57");
		check_address_canonical(0x00, "0x00");
		check_address_canonical(0x50, "0x50");
		check_address_canonical(0x57, "0x57");
		check_address_canonical(0x7f, "0x7f");
		check_invalid_address("");
		check_invalid_address("0x");
		check_invalid_address("80");
		check_invalid_address("0xff");
		check_invalid_address("0x100");
		check_invalid_address("050");
		check_invalid_address("g0");
		check_invalid_address("-1");
	}

	#[test]
	fn reject_8bit_address() {
		assert!(DeviceAddress::new(0x7f).is_ok());
		assert!(DeviceAddress::new(0x80).is_err());
		assert!(DeviceAddress::new(0xa0).is_err());
		assert_eq!(DeviceAddress::default().get(), 0x50);
	}
}
