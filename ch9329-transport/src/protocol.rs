//! Protocol constants for CH9329 serial communication
//!
//! Frame layout (checksum = sum of all preceding bytes mod 256):
//!
//! ```text
//! ┌──────┬──────┬──────┬────────┬──────────────┬──────────┐
//! │ HEAD │ ADDR │ CMD  │  LEN   │     DATA     │   SUM    │
//! ├──────┼──────┼──────┼────────┼──────────────┼──────────┤
//! │57 AB │ 00   │ xx   │   N    │   N bytes    │ checksum │
//! └──────┴──────┴──────┴────────┴──────────────┴──────────┘
//! ```

use std::fmt;

/// Fixed two-byte frame header.
pub const FRAME_HEAD: [u8; 2] = [0x57, 0xAB];

/// Default device address. 0x00 is accepted by any chip.
pub const ADDR_DEFAULT: u8 = 0x00;

/// One-byte length field bounds the payload.
pub const MAX_PAYLOAD_LEN: usize = 255;

/// Head(2) + addr(1) + cmd(1) + len(1) + checksum(1), payload empty.
pub const MIN_FRAME_LEN: usize = 6;

/// Non-payload bytes in every frame.
pub const FRAME_OVERHEAD: usize = 6;

/// Normal ACK echoes the request command with bit 7 set.
pub const ACK_SUCCESS_BITS: u8 = 0x80;

/// Error ACK echoes the request command with bits 7+6 set.
pub const ACK_ERROR_BITS: u8 = 0xC0;

/// Command codes (per WCH CH9329 serial protocol V1.0)
pub mod cmd {
    /// Get chip version, USB status, and lock-LED status
    pub const GET_INFO: u8 = 0x01;
    /// Send standard 8-byte keyboard report
    pub const SEND_KB_GENERAL_DATA: u8 = 0x02;
    /// Send absolute mouse report (0-4095 coordinates)
    pub const SEND_MS_ABS_DATA: u8 = 0x04;
    /// Send relative mouse report
    pub const SEND_MS_REL_DATA: u8 = 0x05;
    /// Get the 50-byte parameter configuration
    pub const GET_PARA_CFG: u8 = 0x08;
    /// Set the 50-byte parameter configuration
    pub const SET_PARA_CFG: u8 = 0x09;
    /// Get a USB string descriptor
    pub const GET_USB_STRING: u8 = 0x0A;
    /// Set a USB string descriptor
    pub const SET_USB_STRING: u8 = 0x0B;
    /// Restore factory default configuration
    pub const SET_DEFAULT_CFG: u8 = 0x0C;
    /// Software reset
    pub const RESET: u8 = 0x0F;

    /// Get human-readable name for command byte
    pub fn name(cmd: u8) -> &'static str {
        match cmd {
            GET_INFO => "GET_INFO",
            SEND_KB_GENERAL_DATA => "SEND_KB_GENERAL_DATA",
            SEND_MS_ABS_DATA => "SEND_MS_ABS_DATA",
            SEND_MS_REL_DATA => "SEND_MS_REL_DATA",
            GET_PARA_CFG => "GET_PARA_CFG",
            SET_PARA_CFG => "SET_PARA_CFG",
            GET_USB_STRING => "GET_USB_STRING",
            SET_USB_STRING => "SET_USB_STRING",
            SET_DEFAULT_CFG => "SET_DEFAULT_CFG",
            RESET => "RESET",
            _ => "UNKNOWN",
        }
    }
}

/// Serial communication timing constants
pub mod timing {
    /// Attempts per request before giving up
    pub const SEND_RETRIES: usize = 3;
    /// Backoff between attempts (ms)
    pub const RETRY_DELAY_MS: u64 = 20;
    /// Port read deadline per attempt (ms)
    pub const READ_TIMEOUT_MS: u64 = 50;
    /// Read cap when the expected response length is unknown
    pub const READ_FALLBACK_LEN: usize = 64 + super::FRAME_OVERHEAD;
    /// Default CH9329 baud rate
    pub const DEFAULT_BAUD: u32 = 9600;
    /// Chip reboot time after a software reset (ms)
    pub const RESET_WAIT_MS: u64 = 2000;
}

/// Status byte carried in ACK frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// Command executed successfully
    Success,
    /// Serial receive timeout on the chip side
    RecvTimeout,
    /// Chip saw an invalid frame header
    BadHeader,
    /// Unknown command code
    UnknownCommand,
    /// Chip-side checksum mismatch
    ChecksumError,
    /// Parameter error: the request itself is malformed
    BadParameter,
    /// Command understood but execution failed
    ExecutionFailed,
    /// Status byte outside the documented set
    Other(u8),
}

impl AckStatus {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => AckStatus::Success,
            0xE1 => AckStatus::RecvTimeout,
            0xE2 => AckStatus::BadHeader,
            0xE3 => AckStatus::UnknownCommand,
            0xE4 => AckStatus::ChecksumError,
            0xE5 => AckStatus::BadParameter,
            0xE6 => AckStatus::ExecutionFailed,
            other => AckStatus::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            AckStatus::Success => 0x00,
            AckStatus::RecvTimeout => 0xE1,
            AckStatus::BadHeader => 0xE2,
            AckStatus::UnknownCommand => 0xE3,
            AckStatus::ChecksumError => 0xE4,
            AckStatus::BadParameter => 0xE5,
            AckStatus::ExecutionFailed => 0xE6,
            AckStatus::Other(b) => b,
        }
    }

    fn description(self) -> &'static str {
        match self {
            AckStatus::Success => "success",
            AckStatus::RecvTimeout => "serial receive timeout",
            AckStatus::BadHeader => "invalid frame header",
            AckStatus::UnknownCommand => "unknown command code",
            AckStatus::ChecksumError => "checksum mismatch",
            AckStatus::BadParameter => "parameter error",
            AckStatus::ExecutionFailed => "execution failed",
            AckStatus::Other(_) => "undocumented status",
        }
    }
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status 0x{:02X} ({})", self.as_byte(), self.description())
    }
}
