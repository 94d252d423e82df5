use thiserror::Error;

use crate::transport::frame::FrameKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CtpError {
    // Receive-side buffer accounting
    #[error("buffer too small: transfer needs {required} bytes, capacity is {capacity}")]
    BufferTooSmall { required: usize, capacity: usize },
    #[error("buffer overflow: {len} bytes at offset {offset} exceed capacity {capacity}")]
    BufferOverflow {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    // Protocol errors
    #[error("sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch { expected: u8, actual: u8 },
    #[error("unknown frame kind: {0:#04x}")]
    UnknownFrameKind(u8),
    #[error("unexpected {0:?} frame")]
    UnexpectedFrame(FrameKind),
    #[error("truncated {kind:?} frame: need {expected} bytes, got {actual}")]
    TruncatedFrame {
        kind: FrameKind,
        expected: usize,
        actual: usize,
    },
    #[error("length mismatch: START declared {declared} bytes, received {received}")]
    LengthMismatch { declared: usize, received: usize },
    #[error("payload of {len} bytes exceeds transfer limit of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    // Link errors
    #[error("link transmit failed for id {id:#x}")]
    LinkTransmitFailure { id: u32 },
    #[error("port error: {0}")]
    Port(String),

    // Generic errors
    #[error("operation timed out")]
    Timeout,
    #[error("buffer full")]
    BufferFull,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("component not initialized")]
    NotInitialized,
}

impl CtpError {
    /// Whether the error ends the current transfer. Unknown frame kinds are
    /// skipped by the receive loop and keep polling.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CtpError::UnknownFrameKind(_))
    }
}

pub type Result<T> = std::result::Result<T, CtpError>;
