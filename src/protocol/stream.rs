//! Reassembles fixed-size HID reports into an unbounded protocol byte stream.

use crate::state::SessionState;
use crate::transport::{REPORT_SIZE, Transport};
use crate::Result;
use std::sync::Arc;
use tracing::warn;

/// Byte cursor over the report stream. Owned exclusively by the receive
/// loop; the current report buffer is never shared.
pub(crate) struct ByteStream {
    transport: Arc<dyn Transport>,
    state: Arc<SessionState>,
    report: [u8; REPORT_SIZE],
    avail: usize,
    pos: usize,
}

impl ByteStream {
    pub(crate) fn new(transport: Arc<dyn Transport>, state: Arc<SessionState>) -> Self {
        Self { transport, state, report: [0; REPORT_SIZE], avail: 0, pos: 0 }
    }

    /// Next protocol byte, reading a fresh report once the current one is
    /// exhausted. A short read is logged and consumed as-is; a zero-byte
    /// read is a poll timeout and retried silently.
    pub(crate) async fn next_byte(&mut self) -> Result<u8> {
        while self.avail == 0 {
            let read = self.transport.read_report(&mut self.report).await?;
            if read == 0 {
                continue;
            }
            self.state.counters.record_frame();
            if read != REPORT_SIZE {
                warn!(bytes = read, "short HID report, continuing with what arrived");
            }
            // Byte 0 is the valid-byte count, clamped to what actually arrived
            self.avail = usize::from(self.report[0]).min(read.saturating_sub(1));
            self.pos = 1;
        }
        self.avail -= 1;
        let byte = self.report[self.pos];
        self.pos += 1;
        self.state.counters.record_byte();
        Ok(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn stream_over(mock: &Arc<MockTransport>) -> ByteStream {
        ByteStream::new(Arc::new(Arc::clone(mock)), Arc::new(SessionState::new()))
    }

    #[tokio::test]
    async fn serves_bytes_across_report_boundaries() {
        let mock = Arc::new(MockTransport::new());
        mock.push_stream(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x11, 0x22]);

        let mut stream = stream_over(&mock);
        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push(stream.next_byte().await.unwrap());
        }
        assert_eq!(seen, vec![0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x11, 0x22]);
    }

    #[tokio::test]
    async fn skips_reports_with_zero_valid_bytes() {
        let mock = Arc::new(MockTransport::new());
        mock.push_report(&[0, 0x99, 0x99]);
        mock.push_report(&[1, 0x42]);

        let mut stream = stream_over(&mock);
        assert_eq!(stream.next_byte().await.unwrap(), 0x42);
    }

    #[tokio::test]
    async fn counts_frames_and_bytes() {
        let mock = Arc::new(MockTransport::new());
        mock.push_stream(&[1, 2, 3]);

        let state = Arc::new(SessionState::new());
        let mut stream = ByteStream::new(Arc::new(Arc::clone(&mock)), Arc::clone(&state));
        for _ in 0..3 {
            stream.next_byte().await.unwrap();
        }
        let meta = state.counters.snapshot();
        assert_eq!(meta.frames_read, 1);
        assert_eq!(meta.bytes_read, 3);
    }
}
