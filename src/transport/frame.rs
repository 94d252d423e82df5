//! CTP frame codec.
//!
//! Wire layout, byte 0 is always the kind tag:
//!
//! ```text
//! START        | 0 | total_length (1B classic, 2B BE extended) | payload...
//! CONSECUTIVE  | 1 | sequence                                   | payload...
//! END          | 2 | payload...
//! FLOW_CONTROL | 3 | command
//! ERROR        | 4 | code
//! ```

use std::fmt;

use super::mode::{Mode, TAG_SIZE};
use crate::error::{CtpError, Result};
use crate::types::{CanId, RawFrame};

const START_TAG: u8 = 0x00;
const CONSECUTIVE_TAG: u8 = 0x01;
const END_TAG: u8 = 0x02;
const FLOW_CONTROL_TAG: u8 = 0x03;
const ERROR_TAG: u8 = 0x04;

/// CTP frame kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Start,
    Consecutive,
    End,
    FlowControl,
    Error,
}

impl FrameKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            START_TAG => Some(FrameKind::Start),
            CONSECUTIVE_TAG => Some(FrameKind::Consecutive),
            END_TAG => Some(FrameKind::End),
            FLOW_CONTROL_TAG => Some(FrameKind::FlowControl),
            ERROR_TAG => Some(FrameKind::Error),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            FrameKind::Start => START_TAG,
            FrameKind::Consecutive => CONSECUTIVE_TAG,
            FrameKind::End => END_TAG,
            FrameKind::FlowControl => FLOW_CONTROL_TAG,
            FrameKind::Error => ERROR_TAG,
        }
    }
}

/// Flow control commands. Carried on the wire but never awaited by the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCommand {
    Continue,
    Wait,
    Abort,
    Other(u8),
}

impl From<u8> for FlowCommand {
    fn from(value: u8) -> Self {
        match value {
            0 => FlowCommand::Continue,
            1 => FlowCommand::Wait,
            2 => FlowCommand::Abort,
            other => FlowCommand::Other(other),
        }
    }
}

impl From<FlowCommand> for u8 {
    fn from(command: FlowCommand) -> Self {
        match command {
            FlowCommand::Continue => 0,
            FlowCommand::Wait => 1,
            FlowCommand::Abort => 2,
            FlowCommand::Other(value) => value,
        }
    }
}

/// Error frame codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MessageTimeout,
    Other(u8),
}

impl From<u8> for ErrorCode {
    fn from(value: u8) -> Self {
        match value {
            0 => ErrorCode::MessageTimeout,
            other => ErrorCode::Other(other),
        }
    }
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::MessageTimeout => 0,
            ErrorCode::Other(value) => value,
        }
    }
}

/// A decoded CTP frame borrowing its payload from the raw frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalFrame<'a> {
    /// First frame of a transfer. `total_length` is the length of this transfer only.
    Start { total_length: u16, data: &'a [u8] },
    Consecutive { sequence: u8, data: &'a [u8] },
    /// Last frame. May hold padding past the bytes the receiver still expects.
    End { data: &'a [u8] },
    FlowControl { command: FlowCommand },
    Error { code: ErrorCode },
}

impl LogicalFrame<'_> {
    pub fn kind(&self) -> FrameKind {
        match self {
            LogicalFrame::Start { .. } => FrameKind::Start,
            LogicalFrame::Consecutive { .. } => FrameKind::Consecutive,
            LogicalFrame::End { .. } => FrameKind::End,
            LogicalFrame::FlowControl { .. } => FrameKind::FlowControl,
            LogicalFrame::Error { .. } => FrameKind::Error,
        }
    }

    /// Payload bytes carried by data frames
    pub fn data(&self) -> &[u8] {
        match self {
            LogicalFrame::Start { data, .. }
            | LogicalFrame::Consecutive { data, .. }
            | LogicalFrame::End { data } => *data,
            LogicalFrame::FlowControl { .. } | LogicalFrame::Error { .. } => &[],
        }
    }
}

struct HexBytes<'a>(&'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Display for LogicalFrame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalFrame::Start { total_length, data } => {
                write!(f, "START len={} data=[{}]", total_length, HexBytes(data))
            }
            LogicalFrame::Consecutive { sequence, data } => {
                write!(f, "CONSECUTIVE seq={} data=[{}]", sequence, HexBytes(data))
            }
            LogicalFrame::End { data } => write!(f, "END data=[{}]", HexBytes(data)),
            LogicalFrame::FlowControl { command } => write!(f, "FLOW_CONTROL {:?}", command),
            LogicalFrame::Error { code } => write!(f, "ERROR {:?}", code),
        }
    }
}

/// Serializes a logical frame into a raw link frame for `mode`.
///
/// Payload length must fit the kind's capacity for the mode; callers size
/// chunks from [`Mode`] so this is only debug-checked.
pub fn encode(id: CanId, frame: &LogicalFrame<'_>, mode: Mode) -> RawFrame {
    let mut raw = RawFrame {
        id,
        is_fd: mode.is_fd(),
        ..RawFrame::default()
    };
    raw.data[0] = frame.kind().tag();

    let header = match *frame {
        LogicalFrame::Start { total_length, data } => {
            debug_assert!(data.len() <= mode.start_capacity());
            debug_assert!(total_length as usize <= mode.max_total_length());
            match mode.length_field_size() {
                1 => raw.data[1] = total_length as u8,
                _ => raw.data[1..3].copy_from_slice(&total_length.to_be_bytes()),
            }
            mode.start_header_size()
        }
        LogicalFrame::Consecutive { sequence, data } => {
            debug_assert!(data.len() <= mode.consecutive_capacity());
            raw.data[1] = sequence;
            mode.consecutive_header_size()
        }
        LogicalFrame::End { data } => {
            debug_assert!(data.len() <= mode.end_capacity());
            mode.end_header_size()
        }
        LogicalFrame::FlowControl { command } => {
            raw.data[1] = command.into();
            TAG_SIZE + 1
        }
        LogicalFrame::Error { code } => {
            raw.data[1] = code.into();
            TAG_SIZE + 1
        }
    };

    let data = frame.data();
    raw.data[header..header + data.len()].copy_from_slice(data);
    raw.len = (header + data.len()) as u8;
    raw
}

fn require(kind: FrameKind, bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() < expected {
        return Err(CtpError::TruncatedFrame {
            kind,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Parses a raw link frame into a logical frame.
///
/// START payload is cut to the bytes the transfer can hold in its first frame,
/// so trailing padding is dropped. CONSECUTIVE and END payloads are returned
/// as-is up to their capacity; the receiver decides how much of END to keep.
pub fn decode(raw: &RawFrame, mode: Mode) -> Result<LogicalFrame<'_>> {
    let bytes = raw.bytes();
    let tag = *bytes.first().ok_or(CtpError::InvalidParameter)?;
    let kind = FrameKind::from_tag(tag).ok_or(CtpError::UnknownFrameKind(tag))?;

    match kind {
        FrameKind::Start => {
            let header = mode.start_header_size();
            require(kind, bytes, header)?;
            let total_length = match mode.length_field_size() {
                1 => bytes[1] as u16,
                _ => u16::from_be_bytes([bytes[1], bytes[2]]),
            };
            let chunk = (total_length as usize).min(mode.start_capacity());
            require(kind, bytes, header + chunk)?;
            Ok(LogicalFrame::Start {
                total_length,
                data: &bytes[header..header + chunk],
            })
        }
        FrameKind::Consecutive => {
            let header = mode.consecutive_header_size();
            require(kind, bytes, header)?;
            let end = bytes.len().min(header + mode.consecutive_capacity());
            Ok(LogicalFrame::Consecutive {
                sequence: bytes[1],
                data: &bytes[header..end],
            })
        }
        FrameKind::End => {
            let header = mode.end_header_size();
            let end = bytes.len().min(header + mode.end_capacity());
            Ok(LogicalFrame::End {
                data: &bytes[header..end],
            })
        }
        FrameKind::FlowControl => {
            require(kind, bytes, TAG_SIZE + 1)?;
            Ok(LogicalFrame::FlowControl {
                command: bytes[1].into(),
            })
        }
        FrameKind::Error => {
            require(kind, bytes, TAG_SIZE + 1)?;
            Ok(LogicalFrame::Error {
                code: bytes[1].into(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_classic_start() {
        let frame = LogicalFrame::Start {
            total_length: 3,
            data: &[0xAA, 0xBB, 0xCC],
        };
        let raw = encode(0x123, &frame, Mode::Classic);
        assert_eq!(raw.id, 0x123);
        assert_eq!(raw.bytes(), &[0, 3, 0xAA, 0xBB, 0xCC]);
        assert!(!raw.is_fd);
    }

    #[test]
    fn encode_extended_start_uses_big_endian_length() {
        let payload = [0x55u8; 61];
        let frame = LogicalFrame::Start {
            total_length: 0x0102,
            data: &payload,
        };
        let raw = encode(0x7E0, &frame, Mode::Extended);
        assert_eq!(raw.len, 64);
        assert_eq!(&raw.bytes()[..3], &[0, 0x01, 0x02]);
        assert!(raw.is_fd);
    }

    #[test]
    fn decode_start_drops_padding() {
        let raw = RawFrame::new(123, &[0, 3, 0xAA, 0xBB, 0xCC, 0x7F, 0x00, 0x00]).unwrap();
        let frame = decode(&raw, Mode::Classic).unwrap();
        assert_eq!(
            frame,
            LogicalFrame::Start {
                total_length: 3,
                data: &[0xAA, 0xBB, 0xCC]
            }
        );
    }

    #[test]
    fn decode_start_caps_chunk_at_start_capacity() {
        let raw = RawFrame::new(1, &[0, 15, 1, 2, 3, 4, 5, 6]).unwrap();
        let frame = decode(&raw, Mode::Classic).unwrap();
        assert_eq!(frame.data(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn decode_truncated_start() {
        let raw = RawFrame::new(1, &[0, 5, 1, 2]).unwrap();
        assert_eq!(
            decode(&raw, Mode::Classic),
            Err(CtpError::TruncatedFrame {
                kind: FrameKind::Start,
                expected: 7,
                actual: 4
            })
        );
    }

    #[test]
    fn decode_consecutive_and_end() {
        let raw = RawFrame::new(1, &[1, 4, 9, 8, 7, 6, 5, 4]).unwrap();
        assert_eq!(
            decode(&raw, Mode::Classic).unwrap(),
            LogicalFrame::Consecutive {
                sequence: 4,
                data: &[9, 8, 7, 6, 5, 4]
            }
        );

        let raw = RawFrame::new(1, &[2, 0xAA, 0xBB, 0xCC, 0x7F, 0, 0, 0]).unwrap();
        let frame = decode(&raw, Mode::Classic).unwrap();
        assert_eq!(frame.kind(), FrameKind::End);
        assert_eq!(frame.data().len(), 7);
    }

    #[test]
    fn decode_unknown_kind() {
        let raw = RawFrame::new(1, &[0x42, 0, 0]).unwrap();
        assert_eq!(
            decode(&raw, Mode::Classic),
            Err(CtpError::UnknownFrameKind(0x42))
        );
    }

    #[test]
    fn flow_control_and_error_frames() {
        let raw = encode(
            9,
            &LogicalFrame::FlowControl {
                command: FlowCommand::Wait,
            },
            Mode::Classic,
        );
        assert_eq!(raw.bytes(), &[3, 1]);
        assert_eq!(
            decode(&raw, Mode::Classic).unwrap(),
            LogicalFrame::FlowControl {
                command: FlowCommand::Wait
            }
        );

        let raw = RawFrame::new(9, &[4, 0]).unwrap();
        assert_eq!(
            decode(&raw, Mode::Classic).unwrap(),
            LogicalFrame::Error {
                code: ErrorCode::MessageTimeout
            }
        );
    }

    #[test]
    fn display_dumps_payload() {
        let frame = LogicalFrame::Consecutive {
            sequence: 2,
            data: &[0x0A, 0xFF],
        };
        assert_eq!(frame.to_string(), "CONSECUTIVE seq=2 data=[0A FF]");
    }
}
