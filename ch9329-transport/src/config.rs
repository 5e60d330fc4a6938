//! Typed view over the 50-byte CH9329 parameter configuration record
//!
//! The record is fetched with GET_PARA_CFG, edited field-by-field through
//! validated accessors, and written back with SET_PARA_CFG. Changes take
//! effect after the chip's next power cycle; there is no dirty tracking,
//! callers decide when to write back.

use std::fmt;

use thiserror::Error;

/// Exact size of the parameter configuration record.
pub const CONFIG_LEN: usize = 50;

/// Baud rates the chip accepts.
pub const VALID_BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

/// Chip work-mode values. 0x00-0x03 select the mode in software; 0x80-0x83
/// mirror the MODE0/MODE1 hardware pins.
pub mod chip_mode {
    pub const SW_COMPOSITE: u8 = 0x00;
    pub const SW_KEYBOARD: u8 = 0x01;
    pub const SW_MOUSE: u8 = 0x02;
    pub const SW_CUSTOM_HID: u8 = 0x03;
    pub const HW_COMPOSITE: u8 = 0x80;
    pub const HW_KEYBOARD: u8 = 0x81;
    pub const HW_MOUSE: u8 = 0x82;
    pub const HW_CUSTOM_HID: u8 = 0x83;

    pub fn is_valid(value: u8) -> bool {
        matches!(value, 0x00..=0x03 | 0x80..=0x83)
    }

    pub fn name(value: u8) -> &'static str {
        match value {
            SW_COMPOSITE => "Keyboard+Mouse (software)",
            SW_KEYBOARD => "Keyboard only (software)",
            SW_MOUSE => "Mouse only (software)",
            SW_CUSTOM_HID => "Custom HID (software)",
            HW_COMPOSITE => "Keyboard+Mouse (hardware)",
            HW_KEYBOARD => "Keyboard only (hardware)",
            HW_MOUSE => "Mouse only (hardware)",
            HW_CUSTOM_HID => "Custom HID (hardware)",
            _ => "Unknown",
        }
    }
}

/// Serial communication mode values, software or pin-selected.
pub mod serial_mode {
    pub const SW_PROTOCOL: u8 = 0x00;
    pub const SW_ASCII: u8 = 0x01;
    pub const SW_TRANSPARENT: u8 = 0x02;
    pub const HW_PROTOCOL: u8 = 0x80;
    pub const HW_ASCII: u8 = 0x81;
    pub const HW_TRANSPARENT: u8 = 0x82;

    pub fn is_valid(value: u8) -> bool {
        matches!(value, 0x00..=0x02 | 0x80..=0x82)
    }

    pub fn name(value: u8) -> &'static str {
        match value {
            SW_PROTOCOL => "Protocol (software)",
            SW_ASCII => "ASCII (software)",
            SW_TRANSPARENT => "Transparent (software)",
            HW_PROTOCOL => "Protocol (hardware)",
            HW_ASCII => "ASCII (hardware)",
            HW_TRANSPARENT => "Transparent (hardware)",
            _ => "Unknown",
        }
    }
}

// String-descriptor enable bits at byte 36
const ENABLE_CUSTOM_DESCRIPTOR: u8 = 0x80;
const ENABLE_VENDOR_DESCRIPTOR: u8 = 0x04;
const ENABLE_PRODUCT_DESCRIPTOR: u8 = 0x02;
const ENABLE_SERIAL_NO: u8 = 0x01;

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration record must be 50 bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Which custom USB string descriptors the chip reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DescriptorEnable {
    pub vendor: bool,
    pub product: bool,
    pub serial: bool,
}

/// The 50-byte parameter configuration record.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    data: [u8; CONFIG_LEN],
}

impl DeviceConfig {
    /// Wrap a raw record as returned by GET_PARA_CFG.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ConfigError> {
        let data: [u8; CONFIG_LEN] = data
            .try_into()
            .map_err(|_| ConfigError::InvalidLength(data.len()))?;
        Ok(Self { data })
    }

    /// Raw record bytes for SET_PARA_CFG.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    // --- byte 0: work mode ---

    pub fn chip_mode(&self) -> u8 {
        self.data[0]
    }

    pub fn set_chip_mode(&mut self, value: u8) -> Result<(), ConfigError> {
        if !chip_mode::is_valid(value) {
            return Err(ConfigError::InvalidValue {
                field: "chip_mode",
                reason: format!("must be 0x00-0x03 or 0x80-0x83, got 0x{value:02X}"),
            });
        }
        self.data[0] = value;
        Ok(())
    }

    // --- byte 1: serial mode ---

    pub fn serial_mode(&self) -> u8 {
        self.data[1]
    }

    pub fn set_serial_mode(&mut self, value: u8) -> Result<(), ConfigError> {
        if !serial_mode::is_valid(value) {
            return Err(ConfigError::InvalidValue {
                field: "serial_mode",
                reason: format!("must be 0x00-0x02 or 0x80-0x82, got 0x{value:02X}"),
            });
        }
        self.data[1] = value;
        Ok(())
    }

    // --- byte 2: device address ---

    pub fn address(&self) -> u8 {
        self.data[2]
    }

    pub fn set_address(&mut self, value: u8) {
        self.data[2] = value;
    }

    // --- bytes 3..7: baud rate, big-endian ---

    pub fn baud_rate(&self) -> u32 {
        u32::from_be_bytes([self.data[3], self.data[4], self.data[5], self.data[6]])
    }

    pub fn set_baud_rate(&mut self, value: u32) -> Result<(), ConfigError> {
        if !VALID_BAUD_RATES.contains(&value) {
            return Err(ConfigError::InvalidValue {
                field: "baud_rate",
                reason: format!("must be one of {VALID_BAUD_RATES:?}, got {value}"),
            });
        }
        self.data[3..7].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    // --- bytes 9..11: packet interval in ms, big-endian ---

    pub fn packet_interval(&self) -> u16 {
        u16::from_be_bytes([self.data[9], self.data[10]])
    }

    pub fn set_packet_interval(&mut self, value: u16) {
        self.data[9..11].copy_from_slice(&value.to_be_bytes());
    }

    // --- bytes 11..15: USB VID/PID, big-endian ---

    pub fn vid(&self) -> u16 {
        u16::from_be_bytes([self.data[11], self.data[12]])
    }

    pub fn set_vid(&mut self, value: u16) {
        self.data[11..13].copy_from_slice(&value.to_be_bytes());
    }

    pub fn pid(&self) -> u16 {
        u16::from_be_bytes([self.data[13], self.data[14]])
    }

    pub fn set_pid(&mut self, value: u16) {
        self.data[13..15].copy_from_slice(&value.to_be_bytes());
    }

    // --- bytes 15..19: keyboard timing, big-endian ---

    pub fn keyboard_submission_interval(&self) -> u16 {
        u16::from_be_bytes([self.data[15], self.data[16]])
    }

    pub fn set_keyboard_submission_interval(&mut self, value: u16) {
        self.data[15..17].copy_from_slice(&value.to_be_bytes());
    }

    pub fn keyboard_release_delay(&self) -> u16 {
        u16::from_be_bytes([self.data[17], self.data[18]])
    }

    pub fn set_keyboard_release_delay(&mut self, value: u16) {
        self.data[17..19].copy_from_slice(&value.to_be_bytes());
    }

    // --- byte 19: auto-enter flag ---

    pub fn auto_enter(&self) -> bool {
        self.data[19] != 0
    }

    pub fn set_auto_enter(&mut self, enabled: bool) {
        self.data[19] = enabled as u8;
    }

    // --- bytes 20..28: enter character set (8 ASCII bytes) ---

    pub fn enter_characters(&self) -> [u8; 8] {
        self.data[20..28].try_into().unwrap()
    }

    pub fn set_enter_characters(&mut self, chars: [u8; 8]) -> Result<(), ConfigError> {
        if let Some(pos) = chars.iter().position(|&c| c > 0x7F) {
            return Err(ConfigError::InvalidValue {
                field: "enter_characters",
                reason: format!("byte {pos} is 0x{:02X}, must be ASCII (<= 0x7F)", chars[pos]),
            });
        }
        self.data[20..28].copy_from_slice(&chars);
        Ok(())
    }

    // --- bytes 28..36: USB filter strings ---

    pub fn filter_strings(&self) -> [u8; 8] {
        self.data[28..36].try_into().unwrap()
    }

    pub fn set_filter_strings(&mut self, value: [u8; 8]) {
        self.data[28..36].copy_from_slice(&value);
    }

    // --- byte 36: string-descriptor enable flags ---

    pub fn descriptor_enable(&self) -> DescriptorEnable {
        let flags = self.data[36];
        DescriptorEnable {
            vendor: flags & ENABLE_VENDOR_DESCRIPTOR != 0,
            product: flags & ENABLE_PRODUCT_DESCRIPTOR != 0,
            serial: flags & ENABLE_SERIAL_NO != 0,
        }
    }

    /// Bit 7 is the master enable; the chip ignores the per-descriptor bits
    /// without it, so it tracks whether any descriptor is enabled.
    pub fn set_descriptor_enable(&mut self, enable: DescriptorEnable) {
        let mut flags = 0u8;
        if enable.vendor {
            flags |= ENABLE_VENDOR_DESCRIPTOR;
        }
        if enable.product {
            flags |= ENABLE_PRODUCT_DESCRIPTOR;
        }
        if enable.serial {
            flags |= ENABLE_SERIAL_NO;
        }
        if flags != 0 {
            flags |= ENABLE_CUSTOM_DESCRIPTOR;
        }
        self.data[36] = flags;
    }

    // --- byte 37: fast submission flag ---

    pub fn keyboard_fast_submission(&self) -> bool {
        self.data[37] != 0
    }

    pub fn set_keyboard_fast_submission(&mut self, enabled: bool) {
        self.data[37] = enabled as u8;
    }

    /// Re-check the whole record against the chip's documented ranges.
    ///
    /// Useful before SET_PARA_CFG when the record was edited by other means
    /// than the validated setters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !chip_mode::is_valid(self.chip_mode()) {
            return Err(ConfigError::InvalidValue {
                field: "chip_mode",
                reason: format!("0x{:02X}", self.chip_mode()),
            });
        }
        if !serial_mode::is_valid(self.serial_mode()) {
            return Err(ConfigError::InvalidValue {
                field: "serial_mode",
                reason: format!("0x{:02X}", self.serial_mode()),
            });
        }
        if !VALID_BAUD_RATES.contains(&self.baud_rate()) {
            return Err(ConfigError::InvalidValue {
                field: "baud_rate",
                reason: format!("{}", self.baud_rate()),
            });
        }
        if self.data[19] > 0x01 {
            return Err(ConfigError::InvalidValue {
                field: "auto_enter",
                reason: format!("0x{:02X}", self.data[19]),
            });
        }
        if self.data[37] > 0x01 {
            return Err(ConfigError::InvalidValue {
                field: "keyboard_fast_submission",
                reason: format!("0x{:02X}", self.data[37]),
            });
        }
        if let Some(pos) = self.enter_characters().iter().position(|&c| c > 0x7F) {
            return Err(ConfigError::InvalidValue {
                field: "enter_characters",
                reason: format!("byte {pos} is not ASCII"),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceConfig(")?;
        for byte in &self.data {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = self.descriptor_enable();
        writeln!(f, "DeviceConfig:")?;
        writeln!(f, "  Work mode: {}", chip_mode::name(self.chip_mode()))?;
        writeln!(f, "  Serial mode: {}", serial_mode::name(self.serial_mode()))?;
        writeln!(f, "  Address: 0x{:02X}", self.address())?;
        writeln!(f, "  Baud rate: {}", self.baud_rate())?;
        writeln!(f, "  Packet interval: {}ms", self.packet_interval())?;
        writeln!(f, "  VID: 0x{:04X}  PID: 0x{:04X}", self.vid(), self.pid())?;
        writeln!(
            f,
            "  Keyboard submit interval: {}ms, release delay: {}ms",
            self.keyboard_submission_interval(),
            self.keyboard_release_delay()
        )?;
        writeln!(f, "  Auto enter: {}", self.auto_enter())?;
        writeln!(
            f,
            "  Descriptors: vendor={} product={} serial={}",
            desc.vendor, desc.product, desc.serial
        )?;
        write!(f, "  Fast submission: {}", self.keyboard_fast_submission())
    }
}
