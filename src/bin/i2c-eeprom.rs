#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate i2c_eeprom;
use i2c_eeprom::*;

use std::fs;
use std::io::{
	self,
	Read,
	Write,
};
use std::process::exit;

use i2c_eeprom::bus::sim::{
	SimConfig,
	SimulatedEeprom,
};
use i2c_eeprom::eeprom::{
	ADDRESS_SPACE,
	AddressWidth,
	Geometry,
};

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn with_context<T, E, F>(result: Result<T, E>, msg: F) -> AResult<T>
where
	failure::Error: From<E>,
	F: FnOnce() -> String,
{
	result.map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("{}: {}", msg(), e);
		e.context(msg).into()
	})
}

// decimal or hex with 0x prefix
fn get_number(matches: &clap::ArgMatches, name: &str) -> AResult<usize> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	let parsed = if param.starts_with("0x") || param.starts_with("0X") {
		usize::from_str_radix(&param[2..], 16)
	} else {
		param.parse::<usize>()
	};
	with_context(parsed, || format!("invalid parameter {}: {:?}", name, param))
}

fn get_address(matches: &clap::ArgMatches, name: &str) -> AResult<u16> {
	let address = get_number(matches, name)?;
	ensure!(address < ADDRESS_SPACE, "{} 0x{:x} beyond the 16-bit address space", name, address);
	Ok(address as u16)
}

fn get_byte(matches: &clap::ArgMatches, name: &str) -> AResult<u8> {
	let value = get_number(matches, name)?;
	ensure!(value <= 0xff, "{} 0x{:x} doesn't fit into a byte", name, value);
	Ok(value as u8)
}

fn hex_dump(base: u16, data: &[u8]) {
	for i in 0..data.len() {
		if 0 == i % 16 {
			print!("{:04x} ", base as usize + i);
		} else if 0 == i % 8 {
			print!(" ");
		}
		print!(" {:02x}", data[i]);
		if 15 == i % 16 {
			println!("");
		}
	}
	if 0 != data.len() % 16 {
		println!("");
	}
}

fn read_exact<B: Bus>(eeprom: &mut Eeprom<B>, address: u16, len: usize) -> AResult<Vec<u8>> {
	let mut data = vec![0u8; len];
	let received = eeprom.read(address, &mut data)?;
	ensure!(received == len, "short read at 0x{:04x}: got {} of {} bytes", address, received, len);
	Ok(data)
}

// remaining chip content from `address` if no length was given
fn get_length<B: Bus>(eeprom: &Eeprom<B>, sub_m: &clap::ArgMatches, address: u16) -> AResult<usize> {
	if sub_m.is_present("LENGTH") {
		return get_number(sub_m, "LENGTH");
	}
	match eeprom.capacity().bytes() {
		Some(size) if size > address as usize => Ok(size - address as usize),
		Some(_) => bail!("address 0x{:04x} beyond the end of the chip", address),
		None => bail!("capacity unknown, need a length"),
	}
}

fn info<B: Bus>(eeprom: &mut Eeprom<B>) -> AResult<()> {
	println!("device:           {}", eeprom.device_address());
	println!("capacity:         {}", eeprom.capacity());
	println!("address width:    {} byte(s)", eeprom.address_width().bytes());
	println!("page size:        {}", eeprom.page_size());
	println!("transaction size: {}", eeprom.transaction_size());
	println!("write time:       {} us", eeprom.write_time());
	Ok(())
}

fn detect<B: Bus>(eeprom: &mut Eeprom<B>) -> AResult<()> {
	let kbit = eeprom.detect_size()?;
	let geometry = Geometry::for_capacity(Capacity::Kbit(kbit));
	println!("{} (page size {})", Capacity::Kbit(kbit), geometry.page_size);
	if Capacity::Kbit(kbit) != eeprom.capacity() {
		warn!("Detected capacity differs from configured {}", eeprom.capacity());
	}
	Ok(())
}

fn dump<B: Bus>(eeprom: &mut Eeprom<B>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = match sub_m.value_of("ADDRESS") {
		Some(_) => get_address(sub_m, "ADDRESS")?,
		None => 0,
	};
	let len = get_length(eeprom, sub_m, address)?;
	let data = read_exact(eeprom, address, len)?;
	hex_dump(address, &data);
	Ok(())
}

fn read<B: Bus>(eeprom: &mut Eeprom<B>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = get_address(sub_m, "ADDRESS")?;
	let len = get_length(eeprom, sub_m, address)?;
	let data = read_exact(eeprom, address, len)?;
	io::stdout().write_all(&data)?;
	Ok(())
}

fn write<B: Bus>(eeprom: &mut Eeprom<B>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = get_address(sub_m, "ADDRESS")?;
	let data = match sub_m.value_of("FILE") {
		Some(path) if path != "-" => with_context(fs::read(path), || format!("couldn't read {:?}", path))?,
		_ => {
			let mut data = Vec::new();
			io::stdin().read_to_end(&mut data)?;
			data
		},
	};
	if let Some(size) = eeprom.capacity().bytes() {
		ensure!(address as usize + data.len() <= size,
			"{} bytes at 0x{:04x} don't fit into a {} byte chip", data.len(), address, size
		);
	}

	eeprom.write(address, &data)?;
	info!("Wrote {} bytes at 0x{:04x}", data.len(), address);
	if eeprom.write_timeouts() > 0 {
		warn!("{} page writes didn't finish within {} us", eeprom.write_timeouts(), eeprom.write_time());
	}

	if !sub_m.is_present("noverify") {
		let read_back = read_exact(eeprom, address, data.len())?;
		if let Some(offset) = read_back.iter().zip(data.iter()).position(|(a, b)| a != b) {
			bail!("verify failed at 0x{:04x}: read 0x{:02x}, expected 0x{:02x}",
				address as usize + offset, read_back[offset], data[offset]);
		}
		info!("Verified successfully");
	}
	Ok(())
}

fn fill<B: Bus>(eeprom: &mut Eeprom<B>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = get_address(sub_m, "ADDRESS")?;
	let len = get_number(sub_m, "LENGTH")?;
	let value = get_byte(sub_m, "VALUE")?;
	eeprom.fill(address, value, len)?;
	info!("Filled {} bytes at 0x{:04x} with 0x{:02x}", len, address, value);
	Ok(())
}

fn update<B: Bus>(eeprom: &mut Eeprom<B>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = get_address(sub_m, "ADDRESS")?;
	let value = get_byte(sub_m, "VALUE")?;
	if eeprom.update(address, value)? {
		info!("0x{:04x}: written 0x{:02x}", address, value);
	} else {
		info!("0x{:04x}: already 0x{:02x}", address, value);
	}
	Ok(())
}

fn run<B: Bus>(bus: B, matches: &clap::ArgMatches) -> AResult<()> {
	let device: DeviceAddress = get_param(matches, "address")?;
	let capacity = match matches.value_of("size") {
		Some(_) => Capacity::Kbit(get_param(matches, "size")?),
		None => Capacity::Unknown,
	};
	let clock: ClockRate = get_param(matches, "clock")?;

	let mut eeprom = Eeprom::new(bus, device, capacity);
	eeprom.begin_with_clock(clock.hz())?;
	if matches.is_present("page") {
		eeprom.set_page_size(get_param(matches, "page")?)?;
	}
	if matches.is_present("timeout") {
		eeprom.set_write_time(get_param(matches, "timeout")?)?;
	}

	let result = match matches.subcommand() {
		("info", _) => info(&mut eeprom),
		("detect", _) => detect(&mut eeprom),
		("dump", Some(sub_m)) => dump(&mut eeprom, sub_m),
		("read", Some(sub_m)) => read(&mut eeprom, sub_m),
		("write", Some(sub_m)) => write(&mut eeprom, sub_m),
		("fill", Some(sub_m)) => fill(&mut eeprom, sub_m),
		("update", Some(sub_m)) => update(&mut eeprom, sub_m),
		("", _) => Err(format_err!("no subcommand")),
		(cmd, _) => Err(format_err!("not implemented subcommand {:?}", cmd)),
	};
	eeprom.end();
	result
}

fn simulated(kbit: u32, device: DeviceAddress, declared: bool) -> AResult<SimulatedEeprom> {
	ensure!(kbit.is_power_of_two() && kbit >= 1 && kbit <= 512,
		"simulated capacity must be a power of two between 1 and 512 kbit, got {}", kbit
	);
	let geometry = Geometry::for_capacity(Capacity::Kbit(kbit));
	let address_bytes = match geometry.address_width {
		AddressWidth::One => 1,
		AddressWidth::Two => 2,
	};
	let config = SimConfig::new(kbit as usize * 128, geometry.page_size)
		.device(device)
		.address_bytes(address_bytes);
	let sim = SimulatedEeprom::new(config);
	info!("Using simulated {} EEPROM at {} (page size {}, {} address byte(s))",
		Capacity::Kbit(kbit), device, sim.config().page_size, sim.config().address_bytes);
	if address_bytes == 1 && !declared {
		warn!("Chips of 2 kbit or less need --size {}, detection assumes 2 address bytes", kbit);
	}
	Ok(sim)
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg bus: -b --bus +takes_value default_value("/dev/i2c-1") "I2C bus device (or bus number)")
		(@arg address: -a --address +takes_value default_value("0x50") "7-bit device address (hex)")
		(@arg size: -s --size +takes_value "capacity in kbit (detected if not given; required for chips of 2 kbit or less)")
		(@arg clock: -c --clock +takes_value default_value("100000") "bus clock in Hz")
		(@arg page: -p --page +takes_value "override page size (8, 16, 32, 64 or 128)")
		(@arg timeout: -t --timeout +takes_value "override write cycle timeout in microseconds")
		(@arg simulate: --simulate +takes_value "use a simulated chip of the given size in kbit instead of the bus")
		(@subcommand info =>
			(about: "show chip geometry")
		)
		(@subcommand detect =>
			(about: "detect capacity through address folding (modifies and restores a few cells)")
		)
		(@subcommand dump =>
			(about: "hex dump of the chip content")
			(@arg ADDRESS: "start address (default 0)")
			(@arg LENGTH: "number of bytes (default: up to the end of the chip)")
		)
		(@subcommand read =>
			(about: "read chip content as binary to stdout")
			(@arg ADDRESS: +required "start address")
			(@arg LENGTH: "number of bytes (default: up to the end of the chip)")
		)
		(@subcommand write =>
			(about: "write a file (or stdin) to the chip and verify it")
			(@arg noverify: -n --noverify "don't read back the written data")
			(@arg ADDRESS: +required "start address")
			(@arg FILE: "file to write, stdin if missing or \"-\"")
		)
		(@subcommand fill =>
			(about: "fill a range with a byte value")
			(@arg ADDRESS: +required "start address")
			(@arg LENGTH: +required "number of bytes")
			(@arg VALUE: +required "byte value")
		)
		(@subcommand update =>
			(about: "write a single byte unless the chip already contains it")
			(@arg ADDRESS: +required "address")
			(@arg VALUE: +required "byte value")
		)
	).get_matches();

	match matches.value_of("simulate") {
		Some(_) => {
			let kbit: u32 = get_param(&matches, "simulate")?;
			let device: DeviceAddress = get_param(&matches, "address")?;
			run(simulated(kbit, device, matches.is_present("size"))?, &matches)
		},
		None => {
			// plain bus numbers are short for /dev/i2c-N
			let path = match matches.value_of("bus") {
				Some(p) => match p.parse::<u32>() {
					Ok(n) => bus::linux::bus_path(n),
					Err(_) => p.to_string(),
				},
				None => bus::linux::bus_path(1),
			};
			let bus = with_context(bus::linux::open_bus(&path), || format!("couldn't open I2C bus {}", path))?;
			debug!("Opened I2C bus {}", bus.path().display());
			run(bus, &matches)
		},
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
