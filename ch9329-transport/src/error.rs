//! Transport and protocol error types

use thiserror::Error;

use crate::protocol::AckStatus;

/// Errors from the byte-level serial transport.
///
/// Only [`TransportError::WriteTimeout`] is transient; everything else means
/// the port is gone or misconfigured and the caller must reopen it.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to open serial port {port}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("transport is closed")]
    Closed,

    #[error("write timed out")]
    WriteTimeout,

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether reissuing the operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::WriteTimeout)
    }
}

/// Failures while decoding and verifying a single ACK frame.
///
/// Checksum verification runs before any command or status interpretation:
/// on a lossy line the checksum is the only integrity guarantee, and a
/// corrupt frame must not be misread as a legitimate device error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AckError {
    #[error("frame too short: {got} bytes, minimum 6")]
    FrameTooShort { got: usize },

    #[error("invalid frame header {got:02X?}, expected [57, AB]")]
    InvalidHeader { got: [u8; 2] },

    #[error("partial frame: declared payload length {declared} exceeds {available} available bytes")]
    PartialFrame { declared: usize, available: usize },

    #[error("checksum mismatch: received 0x{received:02X}, calculated 0x{calculated:02X}")]
    ChecksumMismatch { received: u8, calculated: u8 },

    #[error("device reported {status} for command 0x{cmd:02X}")]
    DeviceError { cmd: u8, status: AckStatus },

    #[error("unexpected command byte 0x{got:02X}, expected 0x{expected:02X}")]
    UnexpectedCommand { expected: u8, got: u8 },

    #[error("payload length mismatch: expected {expected} bytes, got {got}")]
    PayloadLengthMismatch { expected: usize, got: usize },
}

impl AckError {
    /// Retryable failures are symptomatic of line noise or device-side
    /// transients. A device-reported parameter error is the exception: the
    /// request itself is malformed and resending it cannot change the
    /// outcome.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AckError::DeviceError {
                status: AckStatus::BadParameter,
                ..
            }
        )
    }
}

/// Errors from a complete request/response exchange.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Hard transport failure, propagated without retry.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Caller input rejected before any I/O was attempted.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The device rejected the request; retrying the identical frame
    /// cannot succeed.
    #[error("device rejected command 0x{cmd:02X}: {status}")]
    Rejected { cmd: u8, status: AckStatus },

    /// A verified ACK arrived but its payload does not have the shape the
    /// command promises.
    #[error("malformed response for command 0x{cmd:02X}: {reason}")]
    MalformedResponse { cmd: u8, reason: String },

    /// The retry budget was spent without obtaining a valid ACK.
    #[error("no valid response for command 0x{cmd:02X} after {attempts} attempts")]
    Exhausted {
        cmd: u8,
        attempts: usize,
        /// Last decode failure observed, if any attempt got as far as a
        /// candidate frame.
        last: Option<AckError>,
    },
}
