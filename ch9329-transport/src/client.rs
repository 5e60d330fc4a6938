//! Reliable request/response client over a serial transport
//!
//! `Ch9329Client` owns the transport and turns the chip's lossy ACK exchange
//! into typed results. Each request is encoded once and attempted up to the
//! retry budget; the receive buffer is drained before every attempt so a
//! late ACK from a previous exchange cannot answer the current one.
//!
//! Error classification:
//! - hard transport failures propagate immediately (the port is gone)
//! - write timeouts, missing/garbled ACKs, and most device-reported
//!   statuses are retried on a short fixed backoff
//! - a device-reported parameter error stops the loop at once, since the
//!   request itself is malformed
//! - invalid caller input is rejected before any byte reaches the wire

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::DeviceConfig;
use crate::error::{AckError, ProtocolError};
use crate::frame;
use crate::protocol::{cmd, timing, AckStatus, ADDR_DEFAULT, FRAME_OVERHEAD};
use crate::types::{ChipInfo, UsbStringKind};
use crate::Transport;

/// Maximum keycodes in one keyboard report.
pub const MAX_KEYCODES: usize = 6;

/// Maximum bytes in a USB string descriptor.
pub const MAX_USB_STRING_LEN: usize = 23;

/// Highest valid mouse button mask (left | right | middle).
pub const MAX_BUTTON_MASK: u8 = 0x07;

/// Absolute mouse coordinate range is 0..=4095 on both axes.
pub const ABS_COORD_MAX: i32 = 4095;

/// Request/response client for one CH9329 chip.
pub struct Ch9329Client {
    transport: Box<dyn Transport>,
    address: u8,
    retries: usize,
    retry_delay: Duration,
    clock: Box<dyn Clock>,
}

impl Ch9329Client {
    /// Wrap an opened transport with the default retry budget.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self::with_clock(transport, Box::new(SystemClock))
    }

    /// Wrap a transport with an explicit sleep source (tests use a no-op
    /// clock to run the full retry budget instantly).
    pub fn with_clock(transport: Box<dyn Transport>, clock: Box<dyn Clock>) -> Self {
        Self {
            transport,
            address: ADDR_DEFAULT,
            retries: timing::SEND_RETRIES,
            retry_delay: Duration::from_millis(timing::RETRY_DELAY_MS),
            clock,
        }
    }

    /// Access the owned transport.
    pub fn transport(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    /// Whether the underlying transport still has an open port.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Close the underlying port.
    pub fn close(&mut self) {
        self.transport.close();
    }

    /// Send `payload` under `command` and return the ACK payload.
    ///
    /// `expected_len`, when known, pins the response payload length and
    /// bounds the read; `None` reads up to a generous fixed cap.
    pub fn send(
        &mut self,
        command: u8,
        payload: &[u8],
        expected_len: Option<usize>,
    ) -> Result<Vec<u8>, ProtocolError> {
        let request = frame::encode(self.address, command, payload)?;
        let read_len = expected_len
            .map(|len| len + FRAME_OVERHEAD)
            .unwrap_or(timing::READ_FALLBACK_LEN);

        let mut last_err: Option<AckError> = None;
        for attempt in 0..self.retries {
            if attempt > 0 {
                self.clock.sleep(self.retry_delay);
            }

            // A stale ACK from an earlier timed-out exchange must not be
            // taken for this attempt's response.
            if let Ok(stale) = self.transport.read_all() {
                if !stale.is_empty() {
                    trace!(
                        "discarded {} stale bytes before {}",
                        stale.len(),
                        cmd::name(command)
                    );
                }
            }

            match self.transport.write(&request) {
                Ok(()) => {}
                Err(e) if e.is_transient() => {
                    debug!(
                        "write attempt {}/{} for {} timed out",
                        attempt + 1,
                        self.retries,
                        cmd::name(command)
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            trace!("TX {}: {:02X?}", cmd::name(command), request);

            let raw = self.transport.read(read_len)?;
            if raw.is_empty() {
                debug!(
                    "no response on attempt {}/{} for {}",
                    attempt + 1,
                    self.retries,
                    cmd::name(command)
                );
                continue;
            }
            trace!("RX {}: {:02X?}", cmd::name(command), raw);

            let Some(head) = frame::find_head(&raw) else {
                debug!(
                    "no frame head in {} response bytes for {}",
                    raw.len(),
                    cmd::name(command)
                );
                continue;
            };

            match frame::decode_and_verify(&raw[head..], command, expected_len) {
                Ok(payload) => return Ok(payload),
                Err(err) => {
                    if !err.is_retryable() {
                        if let AckError::DeviceError { status, .. } = err {
                            return Err(ProtocolError::Rejected {
                                cmd: command,
                                status,
                            });
                        }
                    }
                    debug!(
                        "decode failed on attempt {}/{} for {}: {}",
                        attempt + 1,
                        self.retries,
                        cmd::name(command),
                        err
                    );
                    last_err = Some(err);
                }
            }
        }

        warn!(
            "{} failed after {} attempts (last error: {:?})",
            cmd::name(command),
            self.retries,
            last_err
        );
        Err(ProtocolError::Exhausted {
            cmd: command,
            attempts: self.retries,
            last: last_err,
        })
    }

    /// For commands whose ACK payload is a single status byte.
    fn expect_status(&self, command: u8, payload: &[u8]) -> Result<(), ProtocolError> {
        match payload.first().map(|&b| AckStatus::from_byte(b)) {
            Some(AckStatus::Success) | None => Ok(()),
            Some(status) => Err(ProtocolError::Rejected {
                cmd: command,
                status,
            }),
        }
    }

    // ========================================================================
    // Chip info and configuration
    // ========================================================================

    /// Query firmware version, USB attachment, and lock-LED state.
    pub fn get_info(&mut self) -> Result<ChipInfo, ProtocolError> {
        let payload = self.send(cmd::GET_INFO, &[], None)?;
        ChipInfo::from_payload(&payload).ok_or_else(|| ProtocolError::MalformedResponse {
            cmd: cmd::GET_INFO,
            reason: format!("{} byte payload, need at least 3", payload.len()),
        })
    }

    /// Fetch the 50-byte parameter configuration.
    pub fn get_config(&mut self) -> Result<DeviceConfig, ProtocolError> {
        let payload = self.send(cmd::GET_PARA_CFG, &[], Some(crate::config::CONFIG_LEN))?;
        DeviceConfig::from_bytes(&payload).map_err(|e| ProtocolError::MalformedResponse {
            cmd: cmd::GET_PARA_CFG,
            reason: e.to_string(),
        })
    }

    /// Write a parameter configuration back to the chip.
    ///
    /// Takes effect after the chip's next power cycle.
    pub fn set_config(&mut self, config: &DeviceConfig) -> Result<(), ProtocolError> {
        let payload = self.send(cmd::SET_PARA_CFG, config.as_bytes(), Some(1))?;
        self.expect_status(cmd::SET_PARA_CFG, &payload)
    }

    /// Read a USB string descriptor (vendor/product/serial).
    pub fn get_usb_string(&mut self, kind: UsbStringKind) -> Result<String, ProtocolError> {
        let payload = self.send(cmd::GET_USB_STRING, &[kind.as_byte()], None)?;
        if payload.len() < 2 {
            return Err(ProtocolError::MalformedResponse {
                cmd: cmd::GET_USB_STRING,
                reason: format!("{} byte payload, need at least 2", payload.len()),
            });
        }
        let len = payload[1] as usize;
        let text = payload.get(2..2 + len).unwrap_or(&payload[2..]);
        Ok(String::from_utf8_lossy(text).into_owned())
    }

    /// Write a USB string descriptor. The chip stores at most 23 ASCII
    /// bytes, checked here before any I/O.
    pub fn set_usb_string(
        &mut self,
        kind: UsbStringKind,
        value: &str,
    ) -> Result<(), ProtocolError> {
        if !value.is_ascii() {
            return Err(ProtocolError::InvalidParameter(format!(
                "{kind} descriptor must be ASCII"
            )));
        }
        if value.len() > MAX_USB_STRING_LEN {
            return Err(ProtocolError::InvalidParameter(format!(
                "{kind} descriptor is {} bytes, maximum {MAX_USB_STRING_LEN}",
                value.len()
            )));
        }

        let mut data = Vec::with_capacity(2 + value.len());
        data.push(kind.as_byte());
        data.push(value.len() as u8);
        data.extend_from_slice(value.as_bytes());
        let payload = self.send(cmd::SET_USB_STRING, &data, Some(1))?;
        self.expect_status(cmd::SET_USB_STRING, &payload)
    }

    /// Restore the factory default configuration.
    pub fn set_default_config(&mut self) -> Result<(), ProtocolError> {
        let payload = self.send(cmd::SET_DEFAULT_CFG, &[], Some(1))?;
        self.expect_status(cmd::SET_DEFAULT_CFG, &payload)
    }

    /// Software-reset the chip. The chip needs about two seconds to come
    /// back; callers sequencing further commands should wait
    /// [`timing::RESET_WAIT_MS`].
    pub fn reset(&mut self) -> Result<(), ProtocolError> {
        let payload = self.send(cmd::RESET, &[], Some(1))?;
        self.expect_status(cmd::RESET, &payload)
    }

    // ========================================================================
    // HID reports
    // ========================================================================

    /// Send a standard 8-byte keyboard report: modifier bitmask plus up to
    /// six scancodes (zero-padded).
    pub fn send_keyboard(
        &mut self,
        modifier: u8,
        keycodes: &[u8],
    ) -> Result<(), ProtocolError> {
        if keycodes.len() > MAX_KEYCODES {
            return Err(ProtocolError::InvalidParameter(format!(
                "keyboard report holds at most {MAX_KEYCODES} keycodes, got {}",
                keycodes.len()
            )));
        }

        let mut data = [0u8; 8];
        data[0] = modifier;
        // data[1] is the reserved byte, always zero
        data[2..2 + keycodes.len()].copy_from_slice(keycodes);

        let payload = self.send(cmd::SEND_KB_GENERAL_DATA, &data, Some(1))?;
        self.expect_status(cmd::SEND_KB_GENERAL_DATA, &payload)
    }

    /// Send a relative mouse report. Deltas and wheel are clamped to
    /// [-127, 127] before two's-complement encoding.
    pub fn send_mouse_rel(
        &mut self,
        dx: i32,
        dy: i32,
        buttons: u8,
        wheel: i32,
    ) -> Result<(), ProtocolError> {
        if buttons > MAX_BUTTON_MASK {
            return Err(ProtocolError::InvalidParameter(format!(
                "button mask must be 0x00-0x07, got 0x{buttons:02X}"
            )));
        }

        let data = [
            0x01, // relative mode marker
            buttons,
            to_signed_byte(dx),
            to_signed_byte(dy),
            to_signed_byte(wheel),
        ];
        let payload = self.send(cmd::SEND_MS_REL_DATA, &data, Some(1))?;
        self.expect_status(cmd::SEND_MS_REL_DATA, &payload)
    }

    /// Send an absolute mouse report. Coordinates are clamped to 0..=4095
    /// and encoded little-endian.
    pub fn send_mouse_abs(
        &mut self,
        x: i32,
        y: i32,
        buttons: u8,
        wheel: i32,
    ) -> Result<(), ProtocolError> {
        if buttons > MAX_BUTTON_MASK {
            return Err(ProtocolError::InvalidParameter(format!(
                "button mask must be 0x00-0x07, got 0x{buttons:02X}"
            )));
        }

        let x = x.clamp(0, ABS_COORD_MAX) as u16;
        let y = y.clamp(0, ABS_COORD_MAX) as u16;
        let data = [
            0x02, // absolute mode marker
            buttons,
            (x & 0xFF) as u8,
            (x >> 8) as u8,
            (y & 0xFF) as u8,
            (y >> 8) as u8,
            to_signed_byte(wheel),
        ];
        let payload = self.send(cmd::SEND_MS_ABS_DATA, &data, Some(1))?;
        self.expect_status(cmd::SEND_MS_ABS_DATA, &payload)
    }
}

/// Clamp to [-127, 127] and encode as a two's-complement byte.
pub fn to_signed_byte(value: i32) -> u8 {
    value.clamp(-127, 127) as i8 as u8
}
