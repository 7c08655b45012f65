//! Shared helpers for building wire fixtures in tests.

#![cfg(test)]

use chrono::{NaiveDate, NaiveDateTime};

/// Append the correct little-endian checksum trailer to packet bytes.
pub(crate) fn with_checksum(mut bytes: Vec<u8>) -> Vec<u8> {
    let sum = bytes.iter().fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)));
    bytes.extend_from_slice(&sum.to_le_bytes());
    bytes
}

/// Fixed timestamp used by decoder tests: 2025-06-15 12:30.
pub(crate) fn sample_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 15)
        .and_then(|d| d.and_hms_opt(12, 30, 0))
        .expect("valid fixture date")
}

/// The wire bytes encoding [`sample_time`] at packet offsets 2..=6.
pub(crate) const SAMPLE_TIME_BYTES: [u8; 5] = [30, 12, 15, 6, 25];
