//! Per-sensor field decoding.
//!
//! Every decoder is a pure function from a payload byte window (a full
//! packet buffer, or a tail slice of one for historic batches) to a
//! [`Reading`]. Numeric fields use nibble encoding: two-byte magnitudes
//! combine as `256 * low_nibble(high) + low`, and sign lives in the high
//! nibble of the most significant byte.

use super::codes;
use super::packet::{Packet, decode_timestamp};
use super::MAX_TEMP_SENSORS;
use crate::reading::{
    BaroReading, BatteryLevel, Forecast, MetaReading, RainReading, Reading, SensorData,
    SensorState, StatusReading, TemperatureReading, UvReading, WindDir, WindReading,
};
use crate::{Result, StationError};
use chrono::NaiveDateTime;
use tracing::warn;

/// Scale applied to the raw rain counters on the wire.
const RAIN_SCALE: f32 = 0.0254;

/// Sign nibble marking a negative magnitude.
const SIGN_NEGATIVE: u8 = 0x8;

fn low(byte: u8) -> u8 {
    byte & 0xF
}

fn high(byte: u8) -> u8 {
    (byte >> 4) & 0xF
}

fn nth_bit(n: u8, value: u16) -> u8 {
    ((value >> n) & 1) as u8
}

/// Signed tenths-resolution value from a nibble-encoded byte pair.
fn signed_tenths(high_byte: u8, low_byte: u8) -> f32 {
    let magnitude =
        f32::from(256 * u16::from(low(high_byte)) + u16::from(low_byte)) / 10.0;
    if high(high_byte) == SIGN_NEGATIVE { -magnitude } else { magnitude }
}

fn require(window: &[u8], need: usize, context: &'static str) -> Result<()> {
    if window.len() < need {
        return Err(StationError::malformed(
            context,
            format!("window holds {} bytes, need {need}", window.len()),
        ));
    }
    Ok(())
}

/// Decode a verified packet into zero or more readings.
///
/// Unknown packet types are logged and yield no readings; malformed field
/// windows surface as droppable errors, an unsupported temperature sensor
/// id as a fatal one.
pub fn decode_packet(packet: &Packet) -> Result<Vec<Reading>> {
    let data = packet.bytes();
    match packet.packet_type() {
        codes::HISTORIC_DATA => decode_historic(data, packet.timestamp()?),
        codes::WIND => Ok(vec![decode_wind(data, packet.timestamp()?)?]),
        codes::RAIN => Ok(vec![decode_rain(data, packet.timestamp()?)?]),
        codes::UV => Ok(vec![decode_uv(data, packet.timestamp()?)?]),
        codes::BARO => Ok(vec![decode_baro(data, packet.timestamp()?)?]),
        codes::TEMP => Ok(vec![decode_temperature(data, packet.timestamp()?)?]),
        codes::STATUS => Ok(vec![decode_status(data, packet.timestamp()?)?]),
        other => {
            warn!("ignoring unknown packet type {other:#04x}");
            Ok(Vec::new())
        }
    }
}

pub fn decode_wind(window: &[u8], time: NaiveDateTime) -> Result<Reading> {
    require(window, 13, "wind")?;
    let dir = WindDir::from_nibble(low(window[7]));
    let gust_speed = f32::from(256 * u16::from(low(window[10])) + u16::from(window[9])) / 10.0;
    let avg_speed = f32::from(16 * u16::from(low(window[11])) + u16::from(high(window[10]))) / 10.0;
    // Raw byte pass-through; the chill encoding is unverified
    let chill = f32::from(window[12]);
    Ok(Reading {
        time,
        sensor: SensorData::Wind(WindReading { dir, gust_speed, avg_speed, chill }),
    })
}

pub fn decode_rain(window: &[u8], time: NaiveDateTime) -> Result<Reading> {
    require(window, 15, "rain")?;
    let pair = |hi: u8, lo: u8| f32::from((u16::from(hi) << 8) + u16::from(lo)) * RAIN_SCALE;
    Ok(Reading {
        time,
        sensor: SensorData::Rain(RainReading {
            rate: pair(window[8], window[7]),
            accum_hour: pair(window[10], window[9]),
            accum_24h: pair(window[12], window[11]),
            accum_since_reset: pair(window[14], window[13]),
        }),
    })
}

pub fn decode_uv(window: &[u8], time: NaiveDateTime) -> Result<Reading> {
    require(window, 8, "uv")?;
    Ok(Reading { time, sensor: SensorData::UvIndex(UvReading { index: low(window[7]) }) })
}

pub fn decode_baro(window: &[u8], time: NaiveDateTime) -> Result<Reading> {
    require(window, 11, "barometric")?;
    let pressure = 256 * u16::from(low(window[8])) + u16::from(window[7]);
    let alt_pressure = 256 * u16::from(low(window[10])) + u16::from(window[9]);
    let forecast_index = high(window[8]);
    let forecast = Forecast::from_nibble(forecast_index).ok_or_else(|| {
        StationError::malformed("barometric", format!("forecast index {forecast_index} out of range"))
    })?;
    Ok(Reading {
        time,
        sensor: SensorData::Barometric(BaroReading { pressure, alt_pressure, forecast }),
    })
}

pub fn decode_temperature(window: &[u8], time: NaiveDateTime) -> Result<Reading> {
    require(window, 14, "temperature")?;
    let sensor_id = low(window[7]);
    if sensor_id > MAX_TEMP_SENSORS {
        return Err(StationError::UnsupportedSensor { sensor_id });
    }
    Ok(Reading {
        time,
        sensor: SensorData::Temperature(TemperatureReading {
            sensor_id,
            humidity: window[10],
            heat_index: window[13],
            temperature: signed_tenths(window[9], window[8]),
            dew_point: signed_tenths(window[12], window[11]),
        }),
    })
}

pub fn decode_status(window: &[u8], time: NaiveDateTime) -> Result<Reading> {
    require(window, 6, "status")?;
    Ok(Reading {
        time,
        sensor: SensorData::Status(StatusReading {
            wind_battery: BatteryLevel::from_bit(nth_bit(0, window[4].into())),
            temp_battery: BatteryLevel::from_bit(nth_bit(1, window[4].into())),
            rain_battery: BatteryLevel::from_bit(nth_bit(4, window[5].into())),
            uv_battery: BatteryLevel::from_bit(nth_bit(5, window[5].into())),
            wind_sensor: SensorState::from_bit(nth_bit(0, window[2].into())),
            temp_sensor: SensorState::from_bit(nth_bit(1, window[2].into())),
            rain_sensor: SensorState::from_bit(nth_bit(4, window[3].into())),
            uv_sensor: SensorState::from_bit(nth_bit(5, window[3].into())),
            // Bit 8 of a single status byte: reads as ok, as on the console
            rtc_signal: BatteryLevel::from_bit(nth_bit(8, window[4].into())),
        }),
    })
}

/// Decode a composite historic batch: one reading per fixed sensor window,
/// then a variable run of extension temperature sensors.
pub fn decode_historic(window: &[u8], time: NaiveDateTime) -> Result<Vec<Reading>> {
    require(window, 33, "historic")?;
    let tail = |offset: usize| window.get(offset..).unwrap_or(&[]);

    // Fixed sub-windows: rain +0, wind +13, uv +20, baro +21, console temp +26
    let mut readings = vec![
        decode_rain(window, time)?,
        decode_wind(tail(13), time)?,
        decode_uv(tail(20), time)?,
        decode_baro(tail(21), time)?,
        decode_temperature(tail(26), time)?,
    ];

    let mut ext_count = usize::from(window[32]);
    let max = usize::from(MAX_TEMP_SENSORS);
    if ext_count > max {
        warn!(count = ext_count, max, "too many extension sensors in historic batch, clamping");
        ext_count = max;
    }
    for i in 0..ext_count {
        readings.push(decode_temperature(tail(33 + 7 * i), time)?);
    }
    Ok(readings)
}

/// Build the synthetic meta reading the heartbeat loop emits.
pub(crate) fn meta_reading(meta: MetaReading, now: NaiveDateTime) -> Reading {
    Reading { time: now, sensor: SensorData::Meta(meta) }
}

/// Timestamp decode is shared with [`Packet`]; re-exported for callers that
/// hold a bare window.
pub fn reading_time(window: &[u8]) -> Result<NaiveDateTime> {
    decode_timestamp(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_time;
    use proptest::prelude::*;

    /// Window builder: `len` zero bytes with `(index, value)` overrides.
    fn window(len: usize, fields: &[(usize, u8)]) -> Vec<u8> {
        let mut w = vec![0u8; len];
        for &(index, value) in fields {
            w[index] = value;
        }
        w
    }

    #[test]
    fn wind_fields() {
        // dir nibble 4 = E, gust 12.3 (0x07B), avg 4.5 (16*2 + 13)
        let w = window(13, &[(7, 0x04), (9, 0x7B), (10, 0xD0), (11, 0x02), (12, 17)]);
        let reading = decode_wind(&w, sample_time()).unwrap();
        let SensorData::Wind(wind) = reading.sensor else { panic!("not wind") };
        assert_eq!(wind.dir, WindDir::E);
        assert!((wind.gust_speed - 12.3).abs() < 1e-5);
        assert!((wind.avg_speed - 4.5).abs() < 1e-5);
        assert_eq!(wind.chill, 17.0);
    }

    #[test]
    fn rain_scaling() {
        // rate raw 0x0102 = 258, hour raw 10, 24h raw 0, reset raw 0xFFFF
        let w = window(15, &[(7, 0x02), (8, 0x01), (9, 10), (13, 0xFF), (14, 0xFF)]);
        let reading = decode_rain(&w, sample_time()).unwrap();
        let SensorData::Rain(rain) = reading.sensor else { panic!("not rain") };
        assert!((rain.rate - 258.0 * RAIN_SCALE).abs() < 1e-4);
        assert!((rain.accum_hour - 10.0 * RAIN_SCALE).abs() < 1e-4);
        assert_eq!(rain.accum_24h, 0.0);
        assert!((rain.accum_since_reset - 65535.0 * RAIN_SCALE).abs() < 1e-1);
    }

    #[test]
    fn uv_index_is_low_nibble() {
        let w = window(8, &[(7, 0xFB)]);
        let reading = decode_uv(&w, sample_time()).unwrap();
        assert_eq!(reading.sensor, SensorData::UvIndex(UvReading { index: 11 }));
    }

    #[test]
    fn baro_pressures_and_forecast() {
        // pressure 256*3 + 0x45 = 837, forecast nibble 2 = cloudy, alt 1000
        let w = window(11, &[(7, 0x45), (8, 0x23), (9, 0xE8), (10, 0x03)]);
        let reading = decode_baro(&w, sample_time()).unwrap();
        let SensorData::Barometric(baro) = reading.sensor else { panic!("not baro") };
        assert_eq!(baro.pressure, 837);
        assert_eq!(baro.alt_pressure, 1000);
        assert_eq!(baro.forecast, Forecast::Cloudy);
    }

    #[test]
    fn baro_rejects_forecast_index_past_table() {
        let w = window(11, &[(8, 0x93)]);
        let err = decode_baro(&w, sample_time()).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn temperature_sign_and_magnitude() {
        // 0x128 = 296 -> 29.6; dew point negative: sign nibble 0x8
        let w = window(14, &[(7, 1), (8, 0x28), (9, 0x01), (10, 55), (11, 0x7B), (12, 0x80), (13, 30)]);
        let reading = decode_temperature(&w, sample_time()).unwrap();
        let SensorData::Temperature(temp) = reading.sensor else { panic!("not temp") };
        assert_eq!(temp.sensor_id, 1);
        assert_eq!(temp.humidity, 55);
        assert_eq!(temp.heat_index, 30);
        assert!((temp.temperature - 29.6).abs() < 1e-5);
        assert!((temp.dew_point - -12.3).abs() < 1e-5);
    }

    #[test]
    fn temperature_rejects_unsupported_sensor_id() {
        let w = window(14, &[(7, 0x0B)]);
        let err = decode_temperature(&w, sample_time()).unwrap_err();
        assert!(matches!(err, StationError::UnsupportedSensor { sensor_id: 11 }));
        assert!(err.is_fatal());
    }

    #[test]
    fn status_bit_positions() {
        // wind battery low (bit 0 of w[4]), rain sensor failed (bit 4 of w[3])
        let w = window(6, &[(4, 0b0000_0001), (3, 0b0001_0000)]);
        let reading = decode_status(&w, sample_time()).unwrap();
        let SensorData::Status(status) = reading.sensor else { panic!("not status") };
        assert_eq!(status.wind_battery, BatteryLevel::Low);
        assert_eq!(status.temp_battery, BatteryLevel::Ok);
        assert_eq!(status.rain_sensor, SensorState::Failed);
        assert_eq!(status.uv_sensor, SensorState::Ok);
        assert_eq!(status.rtc_signal, BatteryLevel::Ok);
    }

    #[test]
    fn historic_decodes_fixed_windows_and_extensions() {
        let mut w = vec![0u8; 120];
        w[7] = 0x04; // rain rate low byte
        w[13 + 7] = 0x04; // wind dir E
        w[26 + 7] = 0x00; // console temp sensor id 0
        w[32] = 2; // two extension sensors
        w[33 + 7] = 0x01; // ext sensor 1
        w[33 + 7 + 7] = 0x02; // ext sensor 2
        let readings = decode_historic(&w, sample_time()).unwrap();
        assert_eq!(readings.len(), 7);
        assert!(matches!(readings[0].sensor, SensorData::Rain(_)));
        assert!(matches!(readings[1].sensor, SensorData::Wind(_)));
        assert!(matches!(readings[4].sensor, SensorData::Temperature(t) if t.sensor_id == 0));
        assert!(matches!(readings[5].sensor, SensorData::Temperature(t) if t.sensor_id == 1));
        assert!(matches!(readings[6].sensor, SensorData::Temperature(t) if t.sensor_id == 2));
    }

    #[test]
    fn historic_clamps_extension_count() {
        // Count byte claims 255 sensors; buffer holds exactly the max
        let mut w = vec![0u8; 33 + 7 * 9 + 14];
        w[32] = 255;
        for i in 0..10 {
            w[33 + 7 * i + 7] = (i + 1) as u8;
        }
        let readings = decode_historic(&w, sample_time()).unwrap();
        assert_eq!(readings.len(), 5 + 10);
    }

    #[test]
    fn historic_short_extension_window_is_droppable() {
        // Claims one extension sensor but the buffer ends before its window
        let mut w = vec![0u8; 40];
        w[32] = 1;
        let err = decode_historic(&w, sample_time()).unwrap_err();
        assert!(!err.is_fatal());
    }

    proptest! {
        #[test]
        fn signed_tenths_roundtrip(raw in 0u16..4096, negative in any::<bool>()) {
            let low_byte = (raw & 0xFF) as u8;
            let mut high_byte = ((raw >> 8) & 0xF) as u8;
            if negative {
                high_byte |= SIGN_NEGATIVE << 4;
            }
            let value = signed_tenths(high_byte, low_byte);
            let expected = f32::from(raw) / 10.0 * if negative { -1.0 } else { 1.0 };
            prop_assert!((value - expected).abs() < 1e-5);
        }
    }
}
