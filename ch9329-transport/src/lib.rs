//! Serial transport and protocol engine for the CH9329 UART HID bridge
//!
//! The CH9329 is a UART-controlled chip that enumerates on its USB side as a
//! standard keyboard/mouse. This crate implements the host side of its
//! framed serial protocol:
//!
//! ```text
//! [SerialTransport]        ← raw byte I/O (serialport, bounded reads)
//!        |
//!  [Ch9329Client]          ← framing, checksums, ACK decoding, retries
//!        |
//! [ch9329-hid / callers]
//! ```
//!
//! Every request is a single frame (`57 AB | addr | cmd | len | data | sum`)
//! answered by an ACK frame carrying either response data or a device error
//! status. The client turns that lossy exchange into a typed
//! request/response API: stale receive buffers are drained before each
//! attempt, garbage bytes ahead of a response are skipped, corrupt or
//! missing ACKs are retried on a fixed budget, and device-reported
//! parameter errors abort immediately since resending the same frame cannot
//! succeed.

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod serial;
pub mod types;

pub use client::Ch9329Client;
pub use clock::{Clock, SystemClock};
pub use config::{ConfigError, DeviceConfig};
pub use error::{AckError, ProtocolError, TransportError};
pub use protocol::AckStatus;
pub use serial::SerialTransport;
pub use types::{ChipInfo, UsbStringKind};

/// Byte-level serial transport contract.
///
/// Implementations wrap one exclusively-owned port handle. All calls are
/// blocking and bounded by the port's configured deadline; a read that times
/// out returns the bytes that did arrive (possibly none) rather than an
/// error, because on a serial link "nothing yet" is an ordinary condition
/// the protocol layer handles with its own retry budget.
pub trait Transport {
    /// Write all bytes and flush them onto the wire.
    ///
    /// A write deadline expiring surfaces as [`TransportError::WriteTimeout`]
    /// so the caller can retry; any other failure means the port itself is
    /// unusable.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read up to `max_len` bytes, returning whatever arrived before the
    /// port deadline. May be empty.
    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError>;

    /// Drain everything currently buffered without blocking.
    fn read_all(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Whether the underlying port is still open.
    fn is_connected(&self) -> bool;

    /// Close the port. Further I/O returns [`TransportError::Closed`].
    fn close(&mut self);
}
