use std::fmt;
use std::str;

/// Bus clock rates two-wire controllers commonly support
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ClockRate {
	/// 10 kHz
	Slow,
	/// 100 kHz
	Standard,
	/// 400 kHz
	Fast,
	/// 1 MHz
	FastPlus,
}

impl ClockRate {
	pub const ALL: [ClockRate; 4] = [
		ClockRate::Slow,
		ClockRate::Standard,
		ClockRate::Fast,
		ClockRate::FastPlus,
	];

	pub fn hz(self) -> u32 {
		match self {
			ClockRate::Slow => 10_000,
			ClockRate::Standard => 100_000,
			ClockRate::Fast => 400_000,
			ClockRate::FastPlus => 1_000_000,
		}
	}

	pub fn try_from_hz(hz: u32) -> Option<Self> {
		Self::ALL.iter().cloned().find(|rate| rate.hz() == hz)
	}

	/// Unsupported rates fall back to the standard 100 kHz.
	pub fn from_hz(hz: u32) -> Self {
		match Self::try_from_hz(hz) {
			Some(rate) => rate,
			None => {
				let rate = Self::default();
				warn!("Unsupported bus clock {} Hz, using {}", hz, rate);
				rate
			},
		}
	}
}

impl Default for ClockRate {
	fn default() -> Self {
		ClockRate::Standard
	}
}

impl fmt::Display for ClockRate {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let hz = self.hz();
		if hz >= 1_000_000 {
			write!(f, "{} MHz", hz / 1_000_000)
		} else {
			write!(f, "{} kHz", hz / 1_000)
		}
	}
}

impl str::FromStr for ClockRate {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let hz = with_context!(("invalid bus clock: {:?}", s),
			s.parse::<u32>().map_err(|e| e.into())
		)?;
		match Self::try_from_hz(hz) {
			Some(rate) => Ok(rate),
			None => bail!("unsupported bus clock {} Hz (supported: 10000, 100000, 400000, 1000000)", hz),
		}
	}
}

#[cfg(test)]
mod test {
	use super::ClockRate;

	#[test]
	fn supported_rates() {
		assert_eq!(ClockRate::from_hz(10_000), ClockRate::Slow);
		assert_eq!(ClockRate::from_hz(100_000), ClockRate::Standard);
		assert_eq!(ClockRate::from_hz(400_000), ClockRate::Fast);
		assert_eq!(ClockRate::from_hz(1_000_000), ClockRate::FastPlus);
		for rate in ClockRate::ALL.iter() {
			assert_eq!(ClockRate::from_hz(rate.hz()), *rate);
		}
	}

	#[test]
	fn unsupported_rates_fall_back() {
		for hz in [0, 1, 9_999, 50_000, 100_001, 399_999, 3_400_000].iter() {
			assert_eq!(ClockRate::try_from_hz(*hz), None, "{} Hz must not be accepted", hz);
			assert_eq!(ClockRate::from_hz(*hz), ClockRate::Standard);
		}
	}

	#[test]
	fn parse_rate() {
		assert_eq!("400000".parse::<ClockRate>().unwrap(), ClockRate::Fast);
		assert!("400".parse::<ClockRate>().is_err());
		assert!("fast".parse::<ClockRate>().is_err());
		assert_eq!(ClockRate::FastPlus.to_string(), "1 MHz");
		assert_eq!(ClockRate::Slow.to_string(), "10 kHz");
	}
}
