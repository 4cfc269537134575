/// Two-wire (I²C) bus transport
///
/// A transaction to a device is opened with a START condition and the device
/// address; queued bytes are sent when it gets closed (STOP), and the device
/// has to acknowledge its address and every byte. A transaction without any
/// bytes is a presence probe: the device acknowledges it only when it is
/// connected and not busy.
///
/// Reads are separate requests for a number of bytes which are then drained
/// from the receive buffer.
///
/// There is only one transaction in flight per bus; sharing a bus between
/// several devices works through the `&mut B` implementation of `Bus`.

mod address;
mod clock;
mod hardware;
mod transmission;

pub mod linux;
pub mod sim;

pub use self::address::DeviceAddress;

pub use self::clock::ClockRate;

pub use self::hardware::{
	Bus,
	DEFAULT_BUFFER_SIZE,
	reliable_sleep,
};

pub use self::transmission::{
	Completion,
	ProgramTransmission,
	Reception,
	Transmission,
	request,
	wait_for_completion,
};
