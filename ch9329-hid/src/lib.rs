//! High-level keyboard/mouse automation for CH9329 UART HID bridges
//!
//! Builds gesture-level operations on top of [`ch9329_transport`]:
//!
//! ```text
//! [SerialTransport]   ← raw byte I/O
//!        |
//!  [Ch9329Client]     ← frames, checksums, retries
//!        |
//! [HidController]     ← logical key/mouse state, gestures
//! ```
//!
//! The controller owns the authoritative logical state: which modifiers and
//! keys are held, which mouse buttons are down, and where the cursor is.
//! Gestures mutate that state and commit it to the hardware, so the chip's
//! USB-side reports never diverge from the caller's intent across a
//! sequence of operations.
//!
//! ```no_run
//! use std::time::Duration;
//! use ch9329_hid::HidController;
//! use ch9329_transport::{Ch9329Client, SerialTransport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let port = SerialTransport::open("/dev/ttyUSB0", 9600)?;
//! let mut hid = HidController::new(Ch9329Client::new(Box::new(port)), 1920, 1080);
//!
//! hid.reset()?;
//! hid.move_to(640.0, 400.0, Duration::from_millis(200))?;
//! hid.click(ch9329_hid::MouseButton::Left, 1)?;
//! hid.hotkey(&["ctrl", "c"])?;
//! hid.type_text("hello")?;
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod error;
pub mod keyboard;
pub mod keymap;
pub mod mouse;

pub use controller::{HidController, Timing};
pub use error::HidError;
pub use keyboard::{KeyboardState, PressedKeys, MAX_KEYCODES};
pub use mouse::{MouseButton, MouseState};

// Re-exported so callers can assemble a controller without naming the
// transport crate separately.
pub use ch9329_transport::{Ch9329Client, ChipInfo, SerialTransport};
