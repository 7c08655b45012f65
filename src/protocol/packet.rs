//! Logical protocol packets and checksum verification.

use crate::{Result, StationError};
use chrono::{NaiveDate, NaiveDateTime};

/// One reassembled protocol message.
///
/// Layout: `[type:1][length:1][payload: length-4][checksum:2 LE]`, where the
/// declared length counts the whole packet including the checksum trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    data: Vec<u8>,
}

impl Packet {
    /// Wrap raw packet bytes. The buffer must hold at least type and length;
    /// [`verify`](Packet::verify) rejects anything inconsistent beyond that.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        debug_assert!(data.len() >= 2);
        Self { data }
    }

    pub fn packet_type(&self) -> u8 {
        self.data[0]
    }

    /// Length byte as transmitted.
    pub fn declared_len(&self) -> usize {
        usize::from(self.data[1])
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Checksum and minimum-length validation.
    ///
    /// The trailing two bytes must hold, little-endian, the sum of every
    /// other byte mod 65536. Declared lengths of 2 or less carry no payload
    /// and no checksum, so they are invalid outright.
    pub fn verify(&self) -> bool {
        let len = self.declared_len();
        if len <= 2 || self.data.len() < len {
            return false;
        }
        let sum: u32 = self.data[..len - 2].iter().map(|&b| u32::from(b)).sum();
        let checksum = u32::from(u16::from_le_bytes([self.data[len - 2], self.data[len - 1]]));
        sum % 65_536 == checksum
    }

    /// Reading timestamp shared by every window of this packet.
    pub fn timestamp(&self) -> Result<NaiveDateTime> {
        decode_timestamp(&self.data)
    }
}

/// Decode the embedded timestamp at bytes 2..=6 of a packet buffer:
/// minute, hour, day, month, year offset from 2000. Seconds are fixed at
/// zero and the value is console-local time.
pub(crate) fn decode_timestamp(window: &[u8]) -> Result<NaiveDateTime> {
    if window.len() < 7 {
        return Err(StationError::malformed(
            "timestamp",
            format!("window holds {} bytes, need 7", window.len()),
        ));
    }
    let (minute, hour, day, month, year) =
        (window[2], window[3], window[4], window[5], 2000 + i32::from(window[6]));
    NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(day))
        .and_then(|date| date.and_hms_opt(u32::from(hour), u32::from(minute), 0))
        .ok_or_else(|| {
            StationError::malformed(
                "timestamp",
                format!("impossible date {year}-{month:02}-{day:02} {hour:02}:{minute:02}"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::with_checksum;
    use proptest::prelude::*;

    #[test]
    fn verify_accepts_correct_checksum() {
        // D5 (UV) packet: type, len 10, timestamp, index nibble, checksum
        let packet = Packet::from_bytes(with_checksum(vec![0xD5, 10, 30, 12, 15, 6, 25, 0x03]));
        assert_eq!(packet.declared_len(), 10);
        assert!(packet.verify());
    }

    #[test]
    fn verify_rejects_minimum_length() {
        assert!(!Packet::from_bytes(vec![0xD5, 0]).verify());
        assert!(!Packet::from_bytes(vec![0xD5, 2]).verify());
        // Declared length larger than the buffer
        assert!(!Packet::from_bytes(vec![0xD5, 40, 1, 2]).verify());
    }

    #[test]
    fn timestamp_decodes_wire_fields() {
        let packet = Packet::from_bytes(with_checksum(vec![0xD5, 10, 30, 12, 15, 6, 25, 0x03]));
        let time = packet.timestamp().unwrap();
        assert_eq!(time, NaiveDate::from_ymd_opt(2025, 6, 15).unwrap().and_hms_opt(12, 30, 0).unwrap());
    }

    #[test]
    fn timestamp_rejects_impossible_dates() {
        // Month 13
        let packet = Packet::from_bytes(with_checksum(vec![0xD5, 10, 30, 12, 15, 13, 25, 0x03]));
        let err = packet.timestamp().unwrap_err();
        assert!(!err.is_fatal());
    }

    proptest! {
        #[test]
        fn checksum_accepts_iff_trailer_matches(payload in prop::collection::vec(any::<u8>(), 1..64)) {
            let mut bytes = vec![0xD3u8, (payload.len() + 4) as u8];
            bytes.extend_from_slice(&payload);
            let bytes = with_checksum(bytes);
            prop_assert!(Packet::from_bytes(bytes).verify());
        }

        #[test]
        fn mutating_any_non_checksum_byte_invalidates(
            payload in prop::collection::vec(any::<u8>(), 1..64),
            flip in any::<u8>().prop_filter("must change the byte", |&f| f != 0),
            index in any::<prop::sample::Index>(),
        ) {
            let mut bytes = vec![0xD3u8, (payload.len() + 4) as u8];
            bytes.extend_from_slice(&payload);
            let mut bytes = with_checksum(bytes);
            let target = index.index(bytes.len() - 2);
            // Skip the length byte: changing it alters which bytes count, not
            // just the sum, and can truncate below the minimum instead.
            prop_assume!(target != 1);
            bytes[target] ^= flip;
            prop_assert!(!Packet::from_bytes(bytes).verify());
        }
    }
}
