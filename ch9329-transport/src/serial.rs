//! Serial port transport
//!
//! Thin blocking wrapper over the `serialport` crate. Reads are bounded by
//! the port deadline and return whatever arrived; only genuine I/O failures
//! surface as errors.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::TransportError;
use crate::protocol::timing;
use crate::Transport;

/// Exclusively-owned handle to one CH9329 serial port.
pub struct SerialTransport {
    path: String,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    /// Open `path` at `baud` with the default per-read deadline.
    pub fn open(path: &str, baud: u32) -> Result<Self, TransportError> {
        Self::open_with_timeout(path, baud, Duration::from_millis(timing::READ_TIMEOUT_MS))
    }

    /// Open with an explicit per-read/write deadline.
    pub fn open_with_timeout(
        path: &str,
        baud: u32,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud)
            .timeout(timeout)
            .open()
            .map_err(|source| TransportError::Open {
                port: path.to_string(),
                source,
            })?;

        info!("serial port opened: {} @ {} baud", path, baud);
        Ok(Self {
            path: path.to_string(),
            port: Some(port),
        })
    }

    /// Path this transport was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        match port.write_all(data).and_then(|()| port.flush()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::TimedOut => Err(TransportError::WriteTimeout),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        if max_len == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; max_len];
        let mut filled = 0;
        while filled < max_len {
            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn read_all(&mut self) -> Result<Vec<u8>, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        let available = port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; available];
        let mut filled = 0;
        while filled < available {
            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("serial port closed: {}", self.path);
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}
