//! Shared per-session state: counters, latest-reading cache, handler chain.
//!
//! Both worker loops touch this state, so every piece is explicitly owned:
//! counters are atomics, the cache sits behind one mutex, and the handler
//! chain is copy-on-write so dispatch never holds a lock across a callback.

use crate::protocol::MAX_TEMP_SENSORS;
use crate::protocol::decode::meta_reading;
use crate::reading::{MetaReading, Reading, SensorData};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

/// Cache slots for temperature sensors: console plus external probes.
const TEMP_SLOTS: usize = MAX_TEMP_SENSORS as usize + 1;

/// How many readings a lagging subscriber may fall behind before dropping.
const BROADCAST_CAPACITY: usize = 64;

pub(crate) type HandlerFn = dyn Fn(&Reading) + Send + Sync;

/// Most recent reading of each kind, replace-if-not-older by timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatestReadings {
    pub wind: Option<Reading>,
    pub rain: Option<Reading>,
    pub uv: Option<Reading>,
    pub barometric: Option<Reading>,
    pub status: Option<Reading>,
    pub meta: Option<Reading>,
    /// Indexed by sensor id; 0 is the console.
    pub temperature: [Option<Reading>; TEMP_SLOTS],
}

impl LatestReadings {
    /// Update-if-newer: the incoming reading wins unless strictly older
    /// than the cached one, so ties favor the newcomer. Meta readings
    /// always replace.
    fn apply(&mut self, reading: &Reading) {
        let slot = match &reading.sensor {
            SensorData::Wind(_) => &mut self.wind,
            SensorData::Rain(_) => &mut self.rain,
            SensorData::UvIndex(_) => &mut self.uv,
            SensorData::Barometric(_) => &mut self.barometric,
            SensorData::Status(_) => &mut self.status,
            // Sensor id is validated at decode, always within the slots
            SensorData::Temperature(t) => &mut self.temperature[usize::from(t.sensor_id)],
            SensorData::Meta(_) => {
                self.meta = Some(reading.clone());
                return;
            }
        };
        match slot {
            Some(cached) if reading.time < cached.time => {}
            _ => *slot = Some(reading.clone()),
        }
    }
}

/// Session-scoped counters, reset when the session opens.
pub(crate) struct SessionCounters {
    frames: AtomicU64,
    bytes: AtomicU64,
    packets: AtomicU64,
    checksum_failures: AtomicU64,
    latest_packet: Mutex<Option<NaiveDateTime>>,
    started: Instant,
}

impl SessionCounters {
    fn new() -> Self {
        Self {
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            packets: AtomicU64::new(0),
            checksum_failures: AtomicU64::new(0),
            latest_packet: Mutex::new(None),
            started: Instant::now(),
        }
    }

    pub(crate) fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_byte(&self) {
        self.bytes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_packet(&self) {
        self.packets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_checksum_failure(&self) {
        self.checksum_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Stamp the wall-clock time a packet passed verification.
    pub(crate) fn mark_accepted(&self) {
        let mut latest = self.latest_packet.lock().unwrap_or_else(|p| p.into_inner());
        *latest = Some(Local::now().naive_local());
    }

    pub(crate) fn snapshot(&self) -> MetaReading {
        MetaReading {
            frames_read: self.frames.load(Ordering::Relaxed),
            bytes_read: self.bytes.load(Ordering::Relaxed),
            packets_parsed: self.packets.load(Ordering::Relaxed),
            checksum_failures: self.checksum_failures.load(Ordering::Relaxed),
            latest_packet: *self.latest_packet.lock().unwrap_or_else(|p| p.into_inner()),
            uptime: self.started.elapsed(),
        }
    }
}

/// State shared between the receive loop, the heartbeat loop and the
/// public `Station` handle.
pub(crate) struct SessionState {
    pub(crate) counters: SessionCounters,
    latest: Mutex<LatestReadings>,
    handlers: RwLock<Arc<Vec<Arc<HandlerFn>>>>,
    broadcast: broadcast::Sender<Reading>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        let (broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            counters: SessionCounters::new(),
            latest: Mutex::new(LatestReadings::default()),
            handlers: RwLock::new(Arc::new(Vec::new())),
            broadcast,
        }
    }

    /// Append a handler; it sees readings decoded from now on.
    pub(crate) fn add_handler(&self, handler: impl Fn(&Reading) + Send + Sync + 'static) {
        let mut guard = self.handlers.write().unwrap_or_else(|p| p.into_inner());
        let mut chain = Vec::clone(&guard);
        chain.push(Arc::new(handler));
        *guard = Arc::new(chain);
    }

    /// Cache update plus synchronous dispatch, in registration order, then
    /// a best-effort broadcast to stream subscribers.
    pub(crate) fn publish(&self, reading: &Reading) {
        self.latest.lock().unwrap_or_else(|p| p.into_inner()).apply(reading);

        let chain = Arc::clone(&self.handlers.read().unwrap_or_else(|p| p.into_inner()));
        for handler in chain.iter() {
            handler(reading);
        }

        // No subscribers is fine
        let _ = self.broadcast.send(reading.clone());
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Reading> {
        self.broadcast.subscribe()
    }

    pub(crate) fn latest(&self) -> LatestReadings {
        self.latest.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Synthesize the meta reading from the current counters.
    pub(crate) fn meta_reading(&self) -> Reading {
        meta_reading(self.counters.snapshot(), Local::now().naive_local())
    }
}
