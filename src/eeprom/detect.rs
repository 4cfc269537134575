/*
Capacity detection through address folding

A chip of `S` bytes ignores the address bits above `S`, so address `S + k`
is the same cell as `k`. Writing a marker to address 0 and then a
different one to `64 << i` for growing `i` shows the size as soon as the
second marker appears at address 0.

The probed cells are saved first and restored afterwards, but while the
detection runs the chip content is modified: nothing else may access the
chip in the meantime.
*/

use crate::error::EepromError;

/// number of candidate fold addresses: 64 bytes up to 64 KiB
pub const PROBE_COUNT: usize = 11;

const PROBE_STRIDE: u32 = 64;
const MATCH_MARKER: u8 = 0x11;
const CHECK_MARKER: u8 = 0xEE;

/// Single byte access to a chip
pub trait ByteAccess {
	fn read_byte(&mut self, address: u16) -> crate::AResult<u8>;
	fn write_byte(&mut self, address: u16, value: u8) -> crate::AResult<()>;
}

/// Candidate fold address `64 << index`.
///
/// The last candidate (64 KiB) doesn't fit into two address bytes and
/// becomes address 0, which aliases on every chip.
pub fn probe_address(index: usize) -> u16 {
	(PROBE_STRIDE << index) as u16
}

fn detection_error(reason: String) -> failure::Error {
	EepromError::Detection(reason).into()
}

// returns the index of the first candidate aliasing address 0
fn find_fold<A: ?Sized + ByteAccess>(access: &mut A) -> crate::AResult<Option<usize>> {
	access.write_byte(0, MATCH_MARKER)?;
	for index in 0..PROBE_COUNT {
		access.write_byte(probe_address(index), CHECK_MARKER)?;
		if access.read_byte(0)? == CHECK_MARKER {
			return Ok(Some(index));
		}
	}
	Ok(None)
}

// tries all cells even after a failure; returns the first failure
fn restore<A: ?Sized + ByteAccess>(access: &mut A, saved_zero: u8, saved: &[u8; PROBE_COUNT]) -> crate::AResult<()> {
	let mut result = access.write_byte(0, saved_zero);
	for (index, value) in saved.iter().enumerate() {
		let address = probe_address(index);
		if let Err(e) = access.write_byte(address, *value) {
			error!("Failed restoring 0x{:04x} after capacity detection: {}", address, e);
			if result.is_ok() {
				result = Err(e);
			}
		}
	}
	result
}

/// Detect the chip capacity in kbit.
///
/// Fails if no folding was found, if the chip folds already at 64 bytes, or
/// if any access failed; in all cases the probed cells were restored (as far
/// as possible) before returning.
pub fn detect_capacity<A: ?Sized + ByteAccess>(access: &mut A) -> crate::AResult<u32> {
	let saved_zero = access.read_byte(0)
		.map_err(|e| detection_error(format!("couldn't save address 0x0000: {}", e)))?;
	let mut saved = [0u8; PROBE_COUNT];
	for (index, value) in saved.iter_mut().enumerate() {
		let address = probe_address(index);
		*value = access.read_byte(address)
			.map_err(|e| detection_error(format!("couldn't save address 0x{:04x}: {}", address, e)))?;
	}

	let fold = find_fold(access);
	let restored = restore(access, saved_zero, &saved);

	if let Err(e) = restored {
		return Err(detection_error(format!("restoring probed cells failed, chip content may be modified: {}", e)));
	}
	match fold {
		Err(e) => Err(detection_error(format!("probing failed: {}", e))),
		Ok(None) => Err(detection_error("no address folding found (write protected?)".into())),
		Ok(Some(0)) => Err(detection_error("chip folds at 64 bytes, too small to be supported".into())),
		Ok(Some(index)) => {
			let kbit = 1u32 << (index - 1);
			debug!("Address folding at 0x{:04x}: {} kbit", PROBE_STRIDE << index, kbit);
			Ok(kbit)
		},
	}
}

#[cfg(test)]
mod test {
	use super::*;

	/// folding memory without any bus: only the low address bits count
	struct Folding {
		memory: Vec<u8>,
		writable: bool,
		fail_write: Option<u16>,
		accesses: Vec<u16>,
	}

	impl Folding {
		fn new(size: usize) -> Self {
			Folding {
				memory: (0..size).map(|i| (i * 7 + 3) as u8).collect(),
				writable: true,
				fail_write: None,
				accesses: Vec::new(),
			}
		}
	}

	impl ByteAccess for Folding {
		fn read_byte(&mut self, address: u16) -> crate::AResult<u8> {
			self.accesses.push(address);
			Ok(self.memory[address as usize % self.memory.len()])
		}

		fn write_byte(&mut self, address: u16, value: u8) -> crate::AResult<()> {
			self.accesses.push(address);
			if self.fail_write == Some(address) && value != CHECK_MARKER && value != MATCH_MARKER {
				bail!("injected failure");
			}
			if self.writable {
				let len = self.memory.len();
				self.memory[address as usize % len] = value;
			}
			Ok(())
		}
	}

	#[test]
	fn probe_addresses() {
		assert_eq!(probe_address(0), 64);
		assert_eq!(probe_address(1), 128);
		assert_eq!(probe_address(9), 0x8000);
		assert_eq!(probe_address(10), 0);
	}

	#[test]
	fn detects_all_sizes() {
		for index in 1..PROBE_COUNT {
			let size = 64usize << index;
			let mut chip = Folding::new(size);
			let before = chip.memory.clone();
			let kbit = detect_capacity(&mut chip).unwrap();
			assert_eq!(kbit as usize * 128, size, "wrong capacity for a {} byte chip", size);
			assert_eq!(chip.memory, before, "{} byte chip not restored", size);
		}
	}

	#[test]
	fn too_small() {
		let mut chip = Folding::new(64);
		let before = chip.memory.clone();
		let e = detect_capacity(&mut chip).unwrap_err();
		match EepromError::find(&e) {
			Some(EepromError::Detection(_)) => (),
			other => panic!("unexpected error: {:?}", other),
		}
		assert_eq!(chip.memory, before);
	}

	#[test]
	fn no_folding() {
		let mut chip = Folding::new(1024);
		chip.writable = false;
		let e = detect_capacity(&mut chip).unwrap_err();
		assert!(EepromError::find(&e).is_some());
		// every candidate was probed
		for index in 0..PROBE_COUNT {
			assert!(chip.accesses.contains(&probe_address(index)));
		}
	}

	#[test]
	fn failed_restore() {
		let mut chip = Folding::new(2048);
		chip.fail_write = Some(128);
		let before = chip.memory.clone();
		let e = detect_capacity(&mut chip).unwrap_err();
		match EepromError::find(&e) {
			Some(EepromError::Detection(reason)) => assert!(reason.contains("restoring"), "{}", reason),
			other => panic!("unexpected error: {:?}", other),
		}
		// the other cells still got restored
		assert_eq!(chip.memory[0], before[0]);
		assert_eq!(chip.memory[64], before[64]);
		assert_eq!(chip.memory[1024], before[1024]);
	}
}
