//! Session supervision: lifecycle commands and the two worker loops.
//!
//! A [`Station`] owns the transport and drives two tasks. The receive loop
//! pumps the framer and dispatches decoded readings; the heartbeat loop
//! keeps the console talking and emits a synthetic meta reading each
//! interval. Shutdown is cooperative: cancellation is observed at the next
//! suspension point (transport read or timer tick), both tasks are joined,
//! and only then is the stop command written and the transport released.

use crate::protocol::decode::decode_packet;
use crate::protocol::{
    ByteStream, Command, Framer, FramerEvent, HEARTBEAT_INTERVAL, WAKE_UP, command_frame,
};
use crate::reading::Reading;
use crate::state::{LatestReadings, SessionState};
use crate::transport::{REPORT_SIZE, Transport};
use crate::{Result, StationError};
use futures::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct StationConfig {
    /// Keep-alive cadence; the console drops the session if starved much
    /// past the default 30 seconds.
    pub heartbeat_interval: Duration,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self { heartbeat_interval: HEARTBEAT_INTERVAL }
    }
}

/// Handle to one console session.
///
/// Lifecycle is `open` (wake the console), `start` (spawn the worker
/// loops and purge the logger), `stop` (cancel, join, send stop). A
/// stopped station cannot be restarted; open a new one.
///
/// Handlers registered with [`add_handler`](Station::add_handler) are
/// invoked synchronously from whichever worker decoded the reading, so
/// they must be thread-safe and should return quickly.
pub struct Station {
    transport: Arc<dyn Transport>,
    state: Arc<SessionState>,
    config: StationConfig,
    cancel: CancellationToken,
    workers: Option<(JoinHandle<Result<()>>, JoinHandle<Result<()>>)>,
}

impl Station {
    /// Open a session over `transport` and send the wake-up sequence.
    pub async fn open(transport: impl Transport) -> Result<Self> {
        Self::open_with(transport, StationConfig::default()).await
    }

    /// [`open`](Station::open) with explicit tunables.
    pub async fn open_with(transport: impl Transport, config: StationConfig) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(transport);
        info!("waking up the console");
        write_frame(&*transport, &WAKE_UP).await?;
        Ok(Self {
            transport,
            state: Arc::new(SessionState::new()),
            config,
            cancel: CancellationToken::new(),
            workers: None,
        })
    }

    /// Open a session against the physical console at the station's fixed
    /// vendor/product identity.
    #[cfg(feature = "hid")]
    pub async fn connect() -> Result<Self> {
        Self::open(crate::transport::hid::HidTransport::open()?).await
    }

    /// Register an observer for every subsequently decoded reading.
    ///
    /// Handlers run synchronously, in registration order, from the worker
    /// loops; failures are the handler's own responsibility.
    pub fn add_handler(&self, handler: impl Fn(&Reading) + Send + Sync + 'static) {
        self.state.add_handler(handler);
    }

    /// Decoded readings as an async stream.
    ///
    /// A subscriber that lags far behind simply misses readings; the
    /// worker loops never block on slow consumers.
    pub fn subscribe(&self) -> impl Stream<Item = Reading> + Send + use<> {
        BroadcastStream::new(self.state.subscribe()).filter_map(|item| async move { item.ok() })
    }

    /// Snapshot of the latest reading of each kind.
    pub fn latest(&self) -> LatestReadings {
        self.state.latest()
    }

    /// Start the heartbeat and receive loops, then purge the console's
    /// data logger so it streams live readings.
    pub async fn start(&mut self) -> Result<()> {
        if self.workers.is_some() {
            return Err(StationError::session("already running"));
        }
        if self.cancel.is_cancelled() {
            return Err(StationError::session("station is stopped"));
        }

        let heartbeat = spawn_worker(
            "heartbeat",
            self.cancel.clone(),
            heartbeat_loop(
                Arc::clone(&self.transport),
                Arc::clone(&self.state),
                self.cancel.clone(),
                self.config.heartbeat_interval,
            ),
        );
        let receive = spawn_worker(
            "receive",
            self.cancel.clone(),
            receive_loop(
                Arc::clone(&self.transport),
                Arc::clone(&self.state),
                self.cancel.clone(),
            ),
        );
        self.workers = Some((heartbeat, receive));

        if let Err(e) = write_command(&*self.transport, Command::EraseLoggerData).await {
            // Bring down whatever already started before surfacing the error
            self.cancel.cancel();
            self.join_workers().await;
            return Err(e);
        }

        info!("station started");
        Ok(())
    }

    /// Stop both loops, send the stop-communication command and release
    /// the transport. Returns the first fatal worker error, if any.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancel.cancel();
        let worker_error = self.join_workers().await;

        let stop_result = write_command(&*self.transport, Command::StopCommunication).await;
        match worker_error {
            Some(e) => Err(e),
            None => stop_result,
        }
    }

    async fn join_workers(&mut self) -> Option<StationError> {
        let mut first_error = None;
        if let Some((heartbeat, receive)) = self.workers.take() {
            for handle in [heartbeat, receive] {
                let outcome = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(StationError::session(format!("worker task failed: {e}"))),
                };
                if let Err(e) = outcome {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error
    }
}

impl Drop for Station {
    fn drop(&mut self) {
        // Cancel workers on drop for clean shutdown
        self.cancel.cancel();
    }
}

/// Wrap a worker so a fatal error also cancels its peer.
fn spawn_worker(
    name: &'static str,
    cancel: CancellationToken,
    worker: impl Future<Output = Result<()>> + Send + 'static,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let result = worker.await;
        if let Err(e) = &result {
            error!(worker = name, error = %e, "worker terminated with fatal error");
            cancel.cancel();
        }
        result
    })
}

/// Write one raw frame, failing the session on a short write.
async fn write_frame(transport: &dyn Transport, frame: &[u8; REPORT_SIZE]) -> Result<()> {
    let written = transport.write_report(frame).await?;
    if written != REPORT_SIZE {
        return Err(StationError::CommandRejected {
            command: frame[1],
            written,
            expected: REPORT_SIZE,
        });
    }
    Ok(())
}

async fn write_command(transport: &dyn Transport, command: Command) -> Result<()> {
    debug!(?command, "sending command frame");
    write_frame(transport, &command_frame(command)).await
}

/// Receive loop: framing, verification, decode, cache update, dispatch.
async fn receive_loop(
    transport: Arc<dyn Transport>,
    state: Arc<SessionState>,
    cancel: CancellationToken,
) -> Result<()> {
    info!("receive loop started");
    let mut framer = Framer::new(ByteStream::new(Arc::clone(&transport), Arc::clone(&state)));

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                info!("receive loop cancelled");
                return Ok(());
            }
            event = framer.next_event() => event?,
        };

        match event {
            FramerEvent::HistoricDataAvailable => {
                info!("console holds unprocessed historic records, requesting them");
                write_command(&*transport, Command::RequestHistoricData).await?;
            }
            FramerEvent::EraseConfirmed => {
                info!("logger purge confirmed");
            }
            FramerEvent::Packet(packet) => {
                state.counters.record_packet();
                if !packet.verify() {
                    warn!(
                        packet_type = packet.packet_type(),
                        declared_len = packet.declared_len(),
                        "dropping packet with bad checksum"
                    );
                    state.counters.record_checksum_failure();
                    continue;
                }
                debug!(
                    packet_type = packet.packet_type(),
                    len = packet.declared_len(),
                    "packet verified"
                );
                state.counters.mark_accepted();

                match decode_packet(&packet) {
                    Ok(readings) => {
                        for reading in &readings {
                            state.publish(reading);
                        }
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => warn!(error = %e, "dropping undecodable packet"),
                }
            }
        }
    }
}

/// Heartbeat loop: periodic keep-alive plus the synthetic meta reading.
async fn heartbeat_loop(
    transport: Arc<dyn Transport>,
    state: Arc<SessionState>,
    cancel: CancellationToken,
    interval: Duration,
) -> Result<()> {
    info!(interval_ms = interval.as_millis() as u64, "heartbeat loop started");
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("heartbeat loop cancelled");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        debug!("sending keep-alive");
        write_command(&*transport, Command::Heartbeat).await?;
        let meta = state.meta_reading();
        state.publish(&meta);
    }
}
