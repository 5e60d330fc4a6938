//! Frame encoding, checksum, and ACK verification
//!
//! Pure functions over byte slices; no I/O. The decode path verifies the
//! checksum before interpreting the command or status bytes, so a corrupted
//! frame can never be mistaken for a legitimate device error.

use crate::error::{AckError, ProtocolError};
use crate::protocol::{
    AckStatus, ACK_ERROR_BITS, ACK_SUCCESS_BITS, FRAME_HEAD, MAX_PAYLOAD_LEN, MIN_FRAME_LEN,
};

/// Sum of all bytes, modulo 256.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Build a complete request frame for `cmd` with `payload`.
///
/// Fails only when the payload does not fit the one-byte length field.
pub fn encode(address: u8, cmd: u8, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::InvalidParameter(format!(
            "payload of {} bytes exceeds the {} byte frame limit",
            payload.len(),
            MAX_PAYLOAD_LEN
        )));
    }

    let mut frame = Vec::with_capacity(MIN_FRAME_LEN + payload.len());
    frame.extend_from_slice(&FRAME_HEAD);
    frame.push(address);
    frame.push(cmd);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame));
    Ok(frame)
}

/// Locate the frame head magic in a receive buffer.
///
/// Garbage bytes may precede a real frame on a noisy line; the caller
/// decodes from the returned offset.
pub fn find_head(buf: &[u8]) -> Option<usize> {
    buf.windows(FRAME_HEAD.len())
        .position(|w| w == FRAME_HEAD)
}

/// Decode an ACK frame located at the start of `raw` and verify it answers
/// `expected_cmd`.
///
/// `expected_len`, when given, pins the exact payload length; pass `None`
/// for variable-length responses. Returns the payload bytes on success.
pub fn decode_and_verify(
    raw: &[u8],
    expected_cmd: u8,
    expected_len: Option<usize>,
) -> Result<Vec<u8>, AckError> {
    if raw.len() < MIN_FRAME_LEN {
        return Err(AckError::FrameTooShort { got: raw.len() });
    }
    if raw[..2] != FRAME_HEAD {
        return Err(AckError::InvalidHeader {
            got: [raw[0], raw[1]],
        });
    }

    let declared = raw[4] as usize;
    let frame_end = 5 + declared;
    if raw.len() < frame_end + 1 {
        return Err(AckError::PartialFrame {
            declared,
            available: raw.len().saturating_sub(MIN_FRAME_LEN),
        });
    }

    let received = raw[frame_end];
    let calculated = checksum(&raw[..frame_end]);
    if received != calculated {
        return Err(AckError::ChecksumMismatch {
            received,
            calculated,
        });
    }

    let payload = &raw[5..frame_end];
    let res_cmd = raw[3];
    if res_cmd == expected_cmd | ACK_ERROR_BITS {
        let status = AckStatus::from_byte(payload.first().copied().unwrap_or(0));
        return Err(AckError::DeviceError {
            cmd: expected_cmd,
            status,
        });
    }
    if res_cmd != expected_cmd | ACK_SUCCESS_BITS {
        return Err(AckError::UnexpectedCommand {
            expected: expected_cmd | ACK_SUCCESS_BITS,
            got: res_cmd,
        });
    }

    if let Some(expected) = expected_len {
        if payload.len() != expected {
            return Err(AckError::PayloadLengthMismatch {
                expected,
                got: payload.len(),
            });
        }
    }

    Ok(payload.to_vec())
}
