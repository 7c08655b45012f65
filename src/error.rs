//! Error types for WMR200 sessions.
//!
//! The protocol layer distinguishes errors a running session absorbs locally
//! (dropped packets) from errors that end the session. [`StationError::is_fatal`]
//! encodes that split so loop code and callers classify consistently.

use thiserror::Error;

/// Result type alias for station operations.
pub type Result<T, E = StationError> = std::result::Result<T, E>;

/// Main error type for station operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StationError {
    #[error("no WMR200 console found (vendor {vendor_id:#06x}, product {product_id:#06x})")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("transport {operation} failed")]
    Transport {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("command frame {command:#04x} rejected: device accepted {written} of {expected} bytes")]
    CommandRejected { command: u8, written: usize, expected: usize },

    #[error("malformed packet in {context}: {details}")]
    MalformedPacket { context: &'static str, details: String },

    #[error("unsupported temperature sensor id {sensor_id}")]
    UnsupportedSensor { sensor_id: u8 },

    #[error("invalid session state: {reason}")]
    Session { reason: String },
}

impl StationError {
    /// Returns whether this error ends the session.
    ///
    /// Malformed packets are dropped and the stream continues; everything
    /// else means the device can no longer be trusted or controlled.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StationError::MalformedPacket { .. })
    }

    /// Helper constructor for transport errors with an operation label.
    pub fn transport(
        operation: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StationError::Transport { operation, source: Box::new(source) }
    }

    /// Helper constructor for dropped-packet decode errors.
    pub fn malformed(context: &'static str, details: impl Into<String>) -> Self {
        StationError::MalformedPacket { context, details: details.into() }
    }

    /// Helper constructor for session lifecycle errors.
    pub fn session(reason: impl Into<String>) -> Self {
        StationError::Session { reason: reason.into() }
    }
}
