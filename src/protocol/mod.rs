//! Wire-level protocol: framing, verification and field decoding.
//!
//! The console speaks a byte stream chopped into fixed-size HID reports.
//! [`ByteStream`] undoes the chopping, [`Framer`] reassembles logical
//! packets and strips in-band control bytes, [`Packet`] verifies checksums,
//! and the decoders in [`decode`] turn payload windows into readings.

pub mod decode;
mod framer;
mod packet;
mod stream;

pub(crate) use framer::{Framer, FramerEvent};
pub use packet::Packet;
pub(crate) use stream::ByteStream;

use crate::transport::REPORT_SIZE;
use std::time::Duration;

/// USB vendor id of the WMR200 console.
pub const VENDOR_ID: u16 = 0x0FDE;
/// USB product id of the WMR200 console.
pub const PRODUCT_ID: u16 = 0xCA01;

/// Highest supported temperature sensor id; ids 1..=10 are external probes.
pub const MAX_TEMP_SENSORS: u8 = 10;

/// Keep-alive cadence expected by the console.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Commands the host sends to the console as `[0x01, code, 0, ..]` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Heartbeat = 0xD0,
    RequestHistoricData = 0xDA,
    EraseLoggerData = 0xDB,
    StopCommunication = 0xDF,
}

/// Fixed wake-up sequence written once at session open.
pub const WAKE_UP: [u8; REPORT_SIZE] = [0x20, 0x00, 0x08, 0x01, 0x00, 0x00, 0x00, 0x00];

/// In-band byte codes the console transmits.
///
/// Control codes and sensor packet types share the `0xD0..=0xDF` range; a
/// byte in that range where a length belongs always starts a new packet.
pub mod codes {
    /// Echo of a keep-alive command.
    pub const HEARTBEAT_ACK: u8 = 0xD0;
    /// The logger holds unprocessed historic records.
    pub const HISTORIC_DATA_AVAILABLE: u8 = 0xD1;
    /// Composite historic batch packet.
    pub const HISTORIC_DATA: u8 = 0xD2;
    pub const WIND: u8 = 0xD3;
    pub const RAIN: u8 = 0xD4;
    pub const UV: u8 = 0xD5;
    pub const BARO: u8 = 0xD6;
    pub const TEMP: u8 = 0xD7;
    pub const STATUS: u8 = 0xD9;
    /// Logger purge completed.
    pub const ERASE_CONFIRMED: u8 = 0xDB;
    /// Echo of a stop-communication command.
    pub const STOP_ECHO: u8 = 0xDF;

    /// Whether a byte falls in the reserved control/type range.
    pub fn in_control_range(byte: u8) -> bool {
        (0xD0..=0xDF).contains(&byte)
    }
}

/// Build the 8-byte command frame for `command`.
pub(crate) fn command_frame(command: Command) -> [u8; REPORT_SIZE] {
    let mut frame = [0u8; REPORT_SIZE];
    frame[0] = 0x01;
    frame[1] = command as u8;
    frame
}
