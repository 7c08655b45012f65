//! Scripted in-memory transport for tests and examples.

use super::{REPORT_SIZE, Transport};
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// How long an empty mock pretends to block before reporting a poll timeout.
const POLL_DELAY: Duration = Duration::from_millis(5);

/// In-memory [`Transport`] fed from scripted reports.
///
/// Reads pop queued reports in order and time out (`Ok(0)`) once the queue is
/// empty; writes are recorded for later inspection. Wrap it in an [`Arc`] and
/// keep a clone to script and inspect it while a session owns the other:
///
/// ```
/// use wmr200::transport::MockTransport;
/// use std::sync::Arc;
///
/// let console = Arc::new(MockTransport::new());
/// console.push_stream(&[0xD1]); // "historic data available" notice
/// let for_station = Arc::clone(&console);
/// # drop(for_station);
/// ```
///
/// [`Arc`]: std::sync::Arc
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    reports: VecDeque<[u8; REPORT_SIZE]>,
    writes: Vec<[u8; REPORT_SIZE]>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one raw report. Shorter slices are zero-padded; byte 0 must
    /// already be the valid-byte count.
    pub fn push_report(&self, data: &[u8]) {
        let mut report = [0u8; REPORT_SIZE];
        let n = data.len().min(REPORT_SIZE);
        report[..n].copy_from_slice(&data[..n]);
        self.lock().reports.push_back(report);
    }

    /// Queue a run of protocol bytes, chunked into reports with the
    /// valid-byte count prefixed, exactly as the console transmits them.
    pub fn push_stream(&self, bytes: &[u8]) {
        for chunk in bytes.chunks(REPORT_SIZE - 1) {
            let mut report = [0u8; REPORT_SIZE];
            report[0] = chunk.len() as u8;
            report[1..=chunk.len()].copy_from_slice(chunk);
            self.lock().reports.push_back(report);
        }
    }

    /// All reports written so far, oldest first.
    pub fn writes(&self) -> Vec<[u8; REPORT_SIZE]> {
        self.lock().writes.clone()
    }

    /// Command codes extracted from recorded `[0x01, code, ..]` frames,
    /// skipping the wake-up sequence and any other raw writes.
    pub fn commands(&self) -> Vec<u8> {
        self.lock().writes.iter().filter(|w| w[0] == 0x01).map(|w| w[1]).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn read_report(&self, report: &mut [u8; REPORT_SIZE]) -> Result<usize> {
        let next = self.lock().reports.pop_front();
        match next {
            Some(data) => {
                *report = data;
                Ok(REPORT_SIZE)
            }
            None => {
                tokio::time::sleep(POLL_DELAY).await;
                Ok(0)
            }
        }
    }

    async fn write_report(&self, report: &[u8; REPORT_SIZE]) -> Result<usize> {
        self.lock().writes.push(*report);
        Ok(REPORT_SIZE)
    }
}
