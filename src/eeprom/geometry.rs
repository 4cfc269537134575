use std::cmp;
use std::fmt;

/// Page sizes of the 24Cxx family
pub const PAGE_SIZES: [usize; 5] = [8, 16, 32, 64, 128];

/// Capacity of a chip in kbit, the way parts are named (24C02: 2 kbit)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Capacity {
	Unknown,
	Kbit(u32),
}

impl Capacity {
	pub fn bytes(self) -> Option<usize> {
		match self {
			Capacity::Unknown => None,
			Capacity::Kbit(kbit) => Some(kbit as usize * 128),
		}
	}

	pub fn is_known(self) -> bool {
		self != Capacity::Unknown
	}
}

impl fmt::Display for Capacity {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			Capacity::Unknown => write!(f, "unknown"),
			Capacity::Kbit(kbit) => write!(f, "{} kbit ({} bytes)", kbit, kbit as usize * 128),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressWidth {
	One,
	Two,
}

impl AddressWidth {
	pub fn bytes(self) -> usize {
		match self {
			AddressWidth::One => 1,
			AddressWidth::Two => 2,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
	pub address_width: AddressWidth,
	pub page_size: usize,
}

const fn geometry(address_width: AddressWidth, page_size: usize) -> Geometry {
	Geometry {
		address_width,
		page_size,
	}
}

// (largest capacity in kbit, geometry); first matching row wins
const GEOMETRY_TABLE: [(u32, Geometry); 4] = [
	(2, geometry(AddressWidth::One, 8)), // 24C01, 24C02
	(8, geometry(AddressWidth::Two, 16)),
	(32, geometry(AddressWidth::Two, 32)),
	(256, geometry(AddressWidth::Two, 64)),
];

// 24C512 and up; also used until the capacity is detected
const LARGE_GEOMETRY: Geometry = geometry(AddressWidth::Two, 128);

impl Geometry {
	pub fn for_capacity(capacity: Capacity) -> Self {
		match capacity {
			Capacity::Unknown => LARGE_GEOMETRY,
			Capacity::Kbit(kbit) => GEOMETRY_TABLE.iter()
				.find(|(max_kbit, _)| kbit <= *max_kbit)
				.map(|(_, geometry)| *geometry)
				.unwrap_or(LARGE_GEOMETRY),
		}
	}

	/// Largest payload of a single transaction: limited by the bus buffer
	/// (which also holds the address) and the page size. At least one byte.
	pub fn transaction_size(&self, buffer_size: usize) -> usize {
		let payload = buffer_size.saturating_sub(self.address_width.bytes());
		cmp::max(1, cmp::min(payload, self.page_size))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn check_geometry(kbit: u32, address_width: AddressWidth, page_size: usize) {
		let g = Geometry::for_capacity(Capacity::Kbit(kbit));
		assert_eq!(g.address_width, address_width, "address width for {} kbit", kbit);
		assert_eq!(g.page_size, page_size, "page size for {} kbit", kbit);
	}

	#[test]
	fn table_lookup() {
		check_geometry(0, AddressWidth::One, 8);
		check_geometry(1, AddressWidth::One, 8);
		check_geometry(2, AddressWidth::One, 8);
		check_geometry(3, AddressWidth::Two, 16);
		check_geometry(4, AddressWidth::Two, 16);
		check_geometry(8, AddressWidth::Two, 16);
		check_geometry(16, AddressWidth::Two, 32);
		check_geometry(32, AddressWidth::Two, 32);
		check_geometry(64, AddressWidth::Two, 64);
		check_geometry(256, AddressWidth::Two, 64);
		check_geometry(257, AddressWidth::Two, 128);
		check_geometry(512, AddressWidth::Two, 128);
		assert_eq!(Geometry::for_capacity(Capacity::Unknown), LARGE_GEOMETRY);
	}

	#[test]
	fn transaction_size_never_exceeds_page() {
		for page_size in PAGE_SIZES.iter() {
			for width in [AddressWidth::One, AddressWidth::Two].iter() {
				let g = geometry(*width, *page_size);
				for buffer_size in 0..300 {
					let size = g.transaction_size(buffer_size);
					assert!(size >= 1);
					assert!(size <= *page_size);
					if buffer_size > width.bytes() {
						assert!(size <= buffer_size - width.bytes());
					}
				}
			}
		}
		assert_eq!(geometry(AddressWidth::Two, 128).transaction_size(32), 30);
		assert_eq!(geometry(AddressWidth::One, 8).transaction_size(32), 8);
		assert_eq!(geometry(AddressWidth::Two, 16).transaction_size(32), 16);
	}

	#[test]
	fn capacity_bytes() {
		assert_eq!(Capacity::Kbit(2).bytes(), Some(256));
		assert_eq!(Capacity::Kbit(512).bytes(), Some(65536));
		assert_eq!(Capacity::Unknown.bytes(), None);
		assert_eq!(Capacity::Kbit(4).to_string(), "4 kbit (512 bytes)");
	}
}
