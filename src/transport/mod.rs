//! Transport seam between the protocol core and the USB HID layer.
//!
//! The core never talks to hardware directly. Everything it needs is a
//! fixed-size report in each direction, so the seam is a two-method trait.
//! [`HidTransport`](hid::HidTransport) (behind the `hid` feature) adapts a
//! real console; [`MockTransport`] scripts one for tests and examples.

#[cfg(feature = "hid")]
pub mod hid;
mod mock;

pub use mock::MockTransport;

use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Size of every HID report exchanged with the console, in bytes.
pub const REPORT_SIZE: usize = 8;

/// Blocking-style report exchange with the console.
///
/// `read_report` may time out internally and return `Ok(0)`; the caller polls
/// again. That timeout is what bounds how long cancellation can take, so
/// implementations should keep it short (hundreds of milliseconds).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Read one report into `report`, returning the number of valid bytes
    /// placed. `Ok(0)` means a poll timeout with no data.
    async fn read_report(&self, report: &mut [u8; REPORT_SIZE]) -> Result<usize>;

    /// Write one report, returning the number of bytes the device accepted.
    async fn write_report(&self, report: &[u8; REPORT_SIZE]) -> Result<usize>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn read_report(&self, report: &mut [u8; REPORT_SIZE]) -> Result<usize> {
        (**self).read_report(report).await
    }

    async fn write_report(&self, report: &[u8; REPORT_SIZE]) -> Result<usize> {
        (**self).write_report(report).await
    }
}
