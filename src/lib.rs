//! Decoder and session driver for the Oregon Scientific WMR200 weather
//! station console.
//!
//! The console speaks a byte-oriented protocol tunnelled through fixed-size
//! USB HID reports. This crate reassembles that tunnel into verified
//! packets, decodes them into typed [`Reading`]s and keeps the console
//! session alive (wake-up, heartbeats, historic-data requests, logger
//! purge, stop).
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use wmr200::{Station, transport::MockTransport};
//!
//! # async fn run() -> wmr200::Result<()> {
//! let mut station = Station::open(MockTransport::new()).await?;
//! station.add_handler(|reading| println!("{reading:?}"));
//! let mut readings = std::pin::pin!(station.subscribe());
//! station.start().await?;
//!
//! while let Some(reading) = readings.next().await {
//!     println!("{:?} at {}", reading.sensor, reading.time);
//! }
//! station.stop().await
//! # }
//! ```
//!
//! Physical hardware is behind the `hid` feature; everything else works
//! against any [`transport::Transport`] implementation.

mod error;
pub mod protocol;
mod reading;
mod state;
mod station;
#[cfg(test)]
mod test_utils;
pub mod transport;

pub use error::{Result, StationError};
pub use reading::{
    BaroReading, BatteryLevel, Forecast, MetaReading, RainReading, Reading, SensorData,
    SensorState, StatusReading, TemperatureReading, UvReading, WindDir, WindReading,
};
pub use state::LatestReadings;
pub use station::{Station, StationConfig};
