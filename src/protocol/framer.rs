//! Packet framing with command/length disambiguation.
//!
//! The wire has no packet boundary marker. The only way to spot a control
//! byte interleaved between packets is that control codes occupy the
//! reserved `0xD0..=0xDF` range, which a length byte must therefore never
//! fall in. The framer is a two-state machine: a byte read in `ExpectType`
//! names the packet, and a byte read in `ExpectLength` that lands in the
//! reserved range is re-dispatched as the next packet type instead of being
//! consumed as a length.

use super::codes;
use super::packet::Packet;
use super::stream::ByteStream;
use crate::Result;
use tracing::debug;

/// What the framer produced: a full packet, or a control notice the
/// receive loop reacts to.
pub(crate) enum FramerEvent {
    Packet(Packet),
    /// The console's data logger holds unprocessed historic records and
    /// wants a request-historic-data command.
    HistoricDataAvailable,
    /// The console confirmed a logger purge.
    EraseConfirmed,
}

enum State {
    ExpectType,
    ExpectLength { packet_type: u8 },
}

pub(crate) struct Framer {
    stream: ByteStream,
}

impl Framer {
    pub(crate) fn new(stream: ByteStream) -> Self {
        Self { stream }
    }

    /// Assemble the next event from the byte stream.
    pub(crate) async fn next_event(&mut self) -> Result<FramerEvent> {
        let mut state = State::ExpectType;
        loop {
            state = match state {
                State::ExpectType => {
                    State::ExpectLength { packet_type: self.stream.next_byte().await? }
                }
                State::ExpectLength { packet_type } => match packet_type {
                    codes::HISTORIC_DATA_AVAILABLE => return Ok(FramerEvent::HistoricDataAvailable),
                    codes::ERASE_CONFIRMED => return Ok(FramerEvent::EraseConfirmed),
                    codes::HEARTBEAT_ACK | codes::STOP_ECHO => {
                        debug!("ignoring control byte {packet_type:#04x}");
                        State::ExpectType
                    }
                    _ => {
                        let length = self.stream.next_byte().await?;
                        if codes::in_control_range(length) {
                            // Not a length: a control byte starting the next
                            // packet. Re-dispatch without consuming a length.
                            State::ExpectLength { packet_type: length }
                        } else {
                            return Ok(FramerEvent::Packet(self.read_body(packet_type, length).await?));
                        }
                    }
                },
            };
        }
    }

    async fn read_body(&mut self, packet_type: u8, length: u8) -> Result<Packet> {
        let len = usize::from(length);
        // Undersized declarations still frame; verification rejects them
        let mut data = vec![0u8; len.max(2)];
        data[0] = packet_type;
        data[1] = length;
        for slot in data.iter_mut().take(len).skip(2) {
            *slot = self.stream.next_byte().await?;
        }
        Ok(Packet::from_bytes(data))
    }
}
