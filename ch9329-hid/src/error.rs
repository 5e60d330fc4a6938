//! Controller error types

use ch9329_transport::ProtocolError;
use thiserror::Error;

/// Errors from gesture-level operations.
#[derive(Error, Debug)]
pub enum HidError {
    /// Protocol or transport failure underneath a gesture
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Key name not present in the keymap
    #[error("unknown key: {0:?}")]
    UnknownKey(String),
}
