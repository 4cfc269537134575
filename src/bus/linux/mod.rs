use std::io;
use std::path::Path;

mod i2c_dev;

pub use self::i2c_dev::I2cDev;

// OS-specific. for now linux only.
pub fn open_bus<P: AsRef<Path>>(path: P) -> io::Result<I2cDev> {
	i2c_dev::inner_open(path.as_ref().to_path_buf())
}

/// `/dev/i2c-N` path for a bus number
pub fn bus_path(bus: u32) -> String {
	format!("/dev/i2c-{}", bus)
}
