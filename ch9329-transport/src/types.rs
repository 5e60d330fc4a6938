//! Chip status types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Chip information returned by GET_INFO.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipInfo {
    /// Firmware version string ("V1.0".."V1.9", or "Unknown (0xNN)")
    pub version: String,
    /// Raw version byte
    pub version_raw: u8,
    /// USB side is enumerated and connected
    pub usb_connected: bool,
    /// Num Lock LED state
    pub num_lock: bool,
    /// Caps Lock LED state
    pub caps_lock: bool,
    /// Scroll Lock LED state
    pub scroll_lock: bool,
}

impl ChipInfo {
    /// Parse from a GET_INFO response payload.
    ///
    /// The chip pads the payload to 8 bytes; only the first three are
    /// meaningful (version, USB status, LED bitmask).
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        if payload.len() < 3 {
            return None;
        }

        let version_raw = payload[0];
        let version = match version_raw {
            0x30..=0x39 => format!("V1.{}", version_raw - 0x30),
            other => format!("Unknown (0x{other:02X})"),
        };
        let leds = payload[2];

        Some(Self {
            version,
            version_raw,
            usb_connected: payload[1] == 0x01,
            num_lock: leds & 0x01 != 0,
            caps_lock: leds & 0x02 != 0,
            scroll_lock: leds & 0x04 != 0,
        })
    }
}

impl fmt::Display for ChipInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, USB {}, LEDs: num={} caps={} scroll={}",
            self.version,
            if self.usb_connected {
                "connected"
            } else {
                "disconnected"
            },
            self.num_lock,
            self.caps_lock,
            self.scroll_lock
        )
    }
}

/// Which USB string descriptor a GET/SET_USB_STRING command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum UsbStringKind {
    Vendor = 0x00,
    Product = 0x01,
    SerialNumber = 0x02,
}

impl UsbStringKind {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Vendor),
            0x01 => Some(Self::Product),
            0x02 => Some(Self::SerialNumber),
            _ => None,
        }
    }
}

impl fmt::Display for UsbStringKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vendor => "vendor",
            Self::Product => "product",
            Self::SerialNumber => "serial number",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_info_parses_version_and_leds() {
        let info = ChipInfo::from_payload(&[0x30, 0x01, 0x00, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(info.version, "V1.0");
        assert!(info.usb_connected);
        assert!(!info.num_lock);
        assert!(!info.caps_lock);
        assert!(!info.scroll_lock);

        let info = ChipInfo::from_payload(&[0x31, 0x01, 0x07]).unwrap();
        assert_eq!(info.version, "V1.1");
        assert!(info.num_lock && info.caps_lock && info.scroll_lock);
    }

    #[test]
    fn chip_info_unknown_version() {
        let info = ChipInfo::from_payload(&[0x42, 0x00, 0x02]).unwrap();
        assert_eq!(info.version, "Unknown (0x42)");
        assert!(!info.usb_connected);
        assert!(info.caps_lock);
    }

    #[test]
    fn chip_info_rejects_short_payload() {
        assert!(ChipInfo::from_payload(&[0x30, 0x01]).is_none());
    }

    #[test]
    fn usb_string_kind_bytes() {
        assert_eq!(UsbStringKind::Vendor.as_byte(), 0x00);
        assert_eq!(UsbStringKind::from_byte(0x02), Some(UsbStringKind::SerialNumber));
        assert_eq!(UsbStringKind::from_byte(0x03), None);
    }
}
