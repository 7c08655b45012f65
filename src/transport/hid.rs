//! USB HID transport backed by `hidapi`.
//!
//! `hidapi` is blocking, so reads and writes hop onto the tokio blocking
//! pool. Reads use a short device timeout and surface it as `Ok(0)`, which
//! keeps session shutdown bounded even while no data is arriving.

use super::{REPORT_SIZE, Transport};
use crate::protocol::{PRODUCT_ID, VENDOR_ID};
use crate::{Result, StationError};
use async_trait::async_trait;
use hidapi::{HidApi, HidDevice};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

const READ_TIMEOUT_MS: i32 = 500;

/// Transport adapter for a physical WMR200 console.
pub struct HidTransport {
    device: Arc<Mutex<HidDevice>>,
}

impl HidTransport {
    /// Open the console at the station's fixed vendor/product identity.
    pub fn open() -> Result<Self> {
        let api = HidApi::new().map_err(|e| StationError::transport("init", e))?;
        let device = api
            .open(VENDOR_ID, PRODUCT_ID)
            .map_err(|_| StationError::DeviceNotFound { vendor_id: VENDOR_ID, product_id: PRODUCT_ID })?;
        info!(vendor = format_args!("{VENDOR_ID:#06x}"), product = format_args!("{PRODUCT_ID:#06x}"), "opened WMR200 console");
        Ok(Self { device: Arc::new(Mutex::new(device)) })
    }

    fn lock(device: &Mutex<HidDevice>) -> MutexGuard<'_, HidDevice> {
        device.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for HidTransport {
    async fn read_report(&self, report: &mut [u8; REPORT_SIZE]) -> Result<usize> {
        let device = Arc::clone(&self.device);
        let (read, data) = tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; REPORT_SIZE];
            let n = Self::lock(&device).read_timeout(&mut buf, READ_TIMEOUT_MS)?;
            Ok::<_, hidapi::HidError>((n, buf))
        })
        .await
        .map_err(|e| StationError::session(format!("HID read task failed: {e}")))?
        .map_err(|e| StationError::transport("read", e))?;

        *report = data;
        Ok(read.min(REPORT_SIZE))
    }

    async fn write_report(&self, report: &[u8; REPORT_SIZE]) -> Result<usize> {
        let device = Arc::clone(&self.device);
        let data = *report;
        tokio::task::spawn_blocking(move || Self::lock(&device).write(&data))
            .await
            .map_err(|e| StationError::session(format!("HID write task failed: {e}")))?
            .map_err(|e| StationError::transport("write", e))
    }
}
