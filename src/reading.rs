//! Decoded sensor readings.
//!
//! A [`Reading`] is a plain value: the timestamp the console embedded in the
//! packet (local time, seconds always zero) plus one kind of sensor data.
//! Readings are cloned freely between the cache, the handler chain and
//! subscribers; nothing here is shared or mutated after decode.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One decoded reading from the console (or a synthetic meta reading).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Timestamp embedded in the packet; emission time for meta readings.
    pub time: NaiveDateTime,
    pub sensor: SensorData,
}

/// Kind-specific payload of a [`Reading`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorData {
    Wind(WindReading),
    Rain(RainReading),
    UvIndex(UvReading),
    Barometric(BaroReading),
    Temperature(TemperatureReading),
    Status(StatusReading),
    Meta(MetaReading),
}

/// Wind speed and direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindReading {
    pub dir: WindDir,
    /// Gust speed in m/s.
    pub gust_speed: f32,
    /// Average speed in m/s.
    pub avg_speed: f32,
    /// Wind chill, carried as the raw wire byte. The console-side encoding
    /// of this field has never been verified against reference hardware.
    pub chill: f32,
}

/// Rain rate plus three accumulation windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RainReading {
    pub rate: f32,
    pub accum_hour: f32,
    pub accum_24h: f32,
    /// Accumulation since the console's last counter reset.
    pub accum_since_reset: f32,
}

/// UV index, numeric only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UvReading {
    pub index: u8,
}

/// Barometric pressure and the console's forecast icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaroReading {
    /// Station pressure in hPa.
    pub pressure: u16,
    /// Sea-level adjusted pressure in hPa.
    pub alt_pressure: u16,
    pub forecast: Forecast,
}

/// Temperature, humidity and dew point for one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    /// 0 is the console itself, 1..=10 are external sensors.
    pub sensor_id: u8,
    /// Relative humidity in percent.
    pub humidity: u8,
    pub heat_index: u8,
    /// Temperature in tenths-resolution degrees Celsius.
    pub temperature: f32,
    pub dew_point: f32,
}

/// Battery and sensor health flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReading {
    pub wind_battery: BatteryLevel,
    pub temp_battery: BatteryLevel,
    pub rain_battery: BatteryLevel,
    pub uv_battery: BatteryLevel,
    pub wind_sensor: SensorState,
    pub temp_sensor: SensorState,
    pub rain_sensor: SensorState,
    pub uv_sensor: SensorState,
    pub rtc_signal: BatteryLevel,
}

/// Synthetic session-health reading, emitted once per heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaReading {
    pub frames_read: u64,
    pub bytes_read: u64,
    pub packets_parsed: u64,
    pub checksum_failures: u64,
    /// Wall-clock time the last valid packet was accepted.
    pub latest_packet: Option<NaiveDateTime>,
    pub uptime: Duration,
}

/// 16-point compass rose, indexed by the wire's direction nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindDir {
    N,
    Nne,
    Ne,
    Ene,
    E,
    Ese,
    Se,
    Sse,
    S,
    Ssw,
    Sw,
    Wsw,
    W,
    Wnw,
    Nw,
    Nnw,
}

impl WindDir {
    const ROSE: [WindDir; 16] = [
        WindDir::N,
        WindDir::Nne,
        WindDir::Ne,
        WindDir::Ene,
        WindDir::E,
        WindDir::Ese,
        WindDir::Se,
        WindDir::Sse,
        WindDir::S,
        WindDir::Ssw,
        WindDir::Sw,
        WindDir::Wsw,
        WindDir::W,
        WindDir::Wnw,
        WindDir::Nw,
        WindDir::Nnw,
    ];

    pub(crate) fn from_nibble(nibble: u8) -> WindDir {
        Self::ROSE[usize::from(nibble & 0xF)]
    }

    /// Compass label, e.g. `"ENE"`.
    pub fn as_compass(&self) -> &'static str {
        match self {
            WindDir::N => "N",
            WindDir::Nne => "NNE",
            WindDir::Ne => "NE",
            WindDir::Ene => "ENE",
            WindDir::E => "E",
            WindDir::Ese => "ESE",
            WindDir::Se => "SE",
            WindDir::Sse => "SSE",
            WindDir::S => "S",
            WindDir::Ssw => "SSW",
            WindDir::Sw => "SW",
            WindDir::Wsw => "WSW",
            WindDir::W => "W",
            WindDir::Wnw => "WNW",
            WindDir::Nw => "NW",
            WindDir::Nnw => "NNW",
        }
    }
}

/// Forecast icon shown on the console display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Forecast {
    PartlyCloudyDay,
    Rainy,
    Cloudy,
    Sunny,
    Clear,
    Snowy,
    PartlyCloudyNight,
}

impl Forecast {
    /// The wire nibble indexes a 7-entry table; anything past it is malformed.
    pub(crate) fn from_nibble(nibble: u8) -> Option<Forecast> {
        match nibble {
            0 => Some(Forecast::PartlyCloudyDay),
            1 => Some(Forecast::Rainy),
            2 => Some(Forecast::Cloudy),
            3 => Some(Forecast::Sunny),
            4 => Some(Forecast::Clear),
            5 => Some(Forecast::Snowy),
            6 => Some(Forecast::PartlyCloudyNight),
            _ => None,
        }
    }
}

/// Battery or RTC signal level flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryLevel {
    Ok,
    Low,
}

impl BatteryLevel {
    pub(crate) fn from_bit(bit: u8) -> BatteryLevel {
        if bit == 0 { BatteryLevel::Ok } else { BatteryLevel::Low }
    }
}

/// Sensor presence flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorState {
    Ok,
    Failed,
}

impl SensorState {
    pub(crate) fn from_bit(bit: u8) -> SensorState {
        if bit == 0 { SensorState::Ok } else { SensorState::Failed }
    }
}
