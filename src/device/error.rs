//! Driver error type.

use crate::frame::FrameError;
use crate::protocol::TransportError;
use thiserror::Error;

/// Errors that terminate an activation or scan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Failure reported by the channel, passed through unchanged.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The sensor answered, but with values that do not match this device.
    #[error("invalid data: {0}")]
    DataInvalid(String),
    /// The sensor explicitly reported that a command failed.
    #[error("protocol failure: {0}")]
    Protocol(String),
    /// The sensor answered with the wrong kind of reply.
    #[error("unexpected {got} reply to {request:?}")]
    UnexpectedReply {
        /// Command that was answered.
        request: crate::protocol::Opcode,
        /// Kind of reply received.
        got: &'static str,
    },
    /// An image buffer could not be decoded.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Another machine is already driving the device.
    #[error("another operation is already running")]
    Busy,
    /// The USB interface has not been claimed.
    #[error("device is not open")]
    NotOpen,
    /// No activation has completed since the last reset.
    #[error("device is not activated")]
    NotActivated,
}

/// Lowercase hex dump used in diagnostics.
pub(crate) fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex(&[0x00, 0xab, 0x7f]), "00ab7f");
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let err = DriverError::from(TransportError::Timeout);
        assert_eq!(err.to_string(), TransportError::Timeout.to_string());
    }
}
