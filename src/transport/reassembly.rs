//! Reassembly engine.
//!
//! [`Reassembler`] is a step machine: each call to [`Reassembler::poll_once`]
//! pulls at most one frame from the link and reports whether the transfer
//! finished. The blocking helpers [`receive`] and [`receive_bytes`] just drive
//! it in a loop, optionally bounded by a deadline. All transfer state lives in
//! the reassembler, so abandoning a receive leaves nothing behind.

use std::time::Instant;

use tracing::{debug, trace, warn};

use super::frame::{decode, FrameKind, LogicalFrame};
use super::mode::Mode;
use crate::error::{CtpError, Result};
use crate::physical::LinkAdapter;
use crate::types::{CanId, RawFrame};

/// State of the transfer in progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferState {
    pub total_length: usize,
    pub received_length: usize,
    pub expected_sequence: u8,
    pub started: bool,
    /// Id the transfer is locked to once its START is accepted
    pub id: Option<CanId>,
}

/// Outcome of feeding one poll or frame to the reassembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// No frame, or a frame that does not concern this transfer
    Idle,
    /// Frame accepted, transfer still open
    Progress,
    /// Transfer complete, holding its total length
    Complete(usize),
}

/// Receive-side state machine for one transfer at a time
#[derive(Debug, Clone)]
pub struct Reassembler {
    mode: Mode,
    rx_id: Option<CanId>,
    state: TransferState,
}

impl Reassembler {
    /// With `rx_id = None` the first accepted START picks the id.
    pub fn new(mode: Mode, rx_id: Option<CanId>) -> Self {
        Self {
            mode,
            rx_id,
            state: TransferState::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    /// Drops any partial transfer
    pub fn reset(&mut self) {
        self.state = TransferState::default();
    }

    /// Polls the link once and feeds the frame, if any, into `buffer`.
    pub fn poll_once<L: LinkAdapter>(&mut self, link: &mut L, buffer: &mut [u8]) -> Result<Step> {
        match link.poll_receive() {
            Some(raw) => self.accept(&raw, buffer),
            None => Ok(Step::Idle),
        }
    }

    /// Feeds one raw frame into the transfer.
    ///
    /// Unknown frame kinds and frames for other ids are skipped. Any error
    /// ends the transfer and resets the state; `buffer` contents are then undefined.
    pub fn accept(&mut self, raw: &RawFrame, buffer: &mut [u8]) -> Result<Step> {
        if raw.is_empty() {
            return Ok(Step::Idle);
        }
        if let Some(id) = self.rx_id.or(self.state.id) {
            if raw.id != id {
                trace!(id = raw.id, expected = id, "ignoring frame for other id");
                return Ok(Step::Idle);
            }
        }

        let frame = match decode(raw, self.mode) {
            Ok(frame) => frame,
            Err(CtpError::UnknownFrameKind(tag)) => {
                debug!(id = raw.id, tag, "skipping unknown frame kind");
                return Ok(Step::Idle);
            }
            Err(err) => return Err(self.fail(err)),
        };
        trace!(id = raw.id, %frame, "rx");

        match self.apply(raw.id, frame, buffer) {
            Ok(Step::Complete(len)) => {
                debug!(id = raw.id, len, "transfer complete");
                self.reset();
                Ok(Step::Complete(len))
            }
            Ok(step) => Ok(step),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn fail(&mut self, err: CtpError) -> CtpError {
        warn!(%err, state = ?self.state, "transfer aborted");
        self.reset();
        err
    }

    fn apply(&mut self, id: CanId, frame: LogicalFrame<'_>, buffer: &mut [u8]) -> Result<Step> {
        let state = &mut self.state;
        match frame {
            LogicalFrame::Start { total_length, data } => {
                if state.started {
                    return Err(CtpError::UnexpectedFrame(FrameKind::Start));
                }
                let total = total_length as usize;
                let max = self.mode.max_transfer_len();
                if total > max {
                    return Err(CtpError::PayloadTooLarge { len: total, max });
                }
                if total > buffer.len() {
                    return Err(CtpError::BufferTooSmall {
                        required: total,
                        capacity: buffer.len(),
                    });
                }
                buffer[..data.len()].copy_from_slice(data);
                *state = TransferState {
                    total_length: total,
                    received_length: data.len(),
                    expected_sequence: 0,
                    started: true,
                    id: Some(id),
                };
                debug!(id, total, "transfer started");

                if state.received_length == total {
                    Ok(Step::Complete(total))
                } else {
                    Ok(Step::Progress)
                }
            }
            LogicalFrame::Consecutive { sequence, data } => {
                if !state.started {
                    return Err(CtpError::UnexpectedFrame(FrameKind::Consecutive));
                }
                if sequence != state.expected_sequence {
                    return Err(CtpError::SequenceMismatch {
                        expected: state.expected_sequence,
                        actual: sequence,
                    });
                }
                let offset = state.received_length;
                let end = offset + data.len();
                if end > buffer.len() {
                    return Err(CtpError::BufferOverflow {
                        offset,
                        len: data.len(),
                        capacity: buffer.len(),
                    });
                }
                if end > state.total_length {
                    return Err(CtpError::LengthMismatch {
                        declared: state.total_length,
                        received: end,
                    });
                }
                buffer[offset..end].copy_from_slice(data);
                state.received_length = end;
                state.expected_sequence = state.expected_sequence.wrapping_add(1);
                Ok(Step::Progress)
            }
            LogicalFrame::End { data } => {
                if !state.started {
                    return Err(CtpError::UnexpectedFrame(FrameKind::End));
                }
                let offset = state.received_length;
                let bytes_left = state.total_length - offset;
                if offset + bytes_left > buffer.len() {
                    return Err(CtpError::BufferOverflow {
                        offset,
                        len: bytes_left,
                        capacity: buffer.len(),
                    });
                }
                if data.len() < bytes_left {
                    return Err(CtpError::TruncatedFrame {
                        kind: FrameKind::End,
                        expected: self.mode.end_header_size() + bytes_left,
                        actual: self.mode.end_header_size() + data.len(),
                    });
                }
                buffer[offset..offset + bytes_left].copy_from_slice(&data[..bytes_left]);
                state.received_length = state.total_length;
                Ok(Step::Complete(state.total_length))
            }
            LogicalFrame::FlowControl { .. } | LogicalFrame::Error { .. } => {
                // Flow control is not part of this protocol revision.
                debug!(id, %frame, "ignoring control frame");
                Ok(Step::Idle)
            }
        }
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.map_or(false, |deadline| Instant::now() >= deadline)
}

/// Drives `reassembler` until one transfer lands in `buffer` or `deadline` passes.
pub fn receive_until<L: LinkAdapter>(
    link: &mut L,
    reassembler: &mut Reassembler,
    buffer: &mut [u8],
    deadline: Option<Instant>,
) -> Result<usize> {
    loop {
        match reassembler.poll_once(link, buffer)? {
            Step::Complete(len) => return Ok(len),
            Step::Progress => continue,
            Step::Idle => {
                if deadline_passed(deadline) {
                    reassembler.reset();
                    return Err(CtpError::Timeout);
                }
                std::hint::spin_loop();
            }
        }
    }
}

/// Collects back-to-back transfers into `buffer` until `length` bytes arrived.
///
/// `length == 0` still takes one transfer, which must be empty: it pairs with
/// the single empty START that `send(&[])` emits.
pub fn receive_bytes_until<L: LinkAdapter>(
    link: &mut L,
    reassembler: &mut Reassembler,
    buffer: &mut [u8],
    length: usize,
    deadline: Option<Instant>,
) -> Result<usize> {
    if length > buffer.len() {
        return Err(CtpError::BufferTooSmall {
            required: length,
            capacity: buffer.len(),
        });
    }

    let mut received = 0;
    loop {
        let window = &mut buffer[received..length];
        let len = match receive_until(link, reassembler, window, deadline) {
            Ok(len) => len,
            Err(CtpError::BufferTooSmall { required, .. }) => {
                return Err(CtpError::BufferOverflow {
                    offset: received,
                    len: required,
                    capacity: length,
                })
            }
            Err(err) => return Err(err),
        };
        received += len;
        if received >= length {
            return Ok(received);
        }
    }
}

/// Receives one transfer into `buffer`, polling until it completes or fails.
///
/// There is no timeout: callers that need one use [`receive_until`] or a
/// [`Ctp`](super::ctp::Ctp) with `timeout_ms` set.
pub fn receive<L: LinkAdapter>(link: &mut L, buffer: &mut [u8], mode: Mode) -> Result<usize> {
    receive_until(link, &mut Reassembler::new(mode, None), buffer, None)
}

/// Receives `length` bytes spread over one or more transfers.
pub fn receive_bytes<L: LinkAdapter>(
    link: &mut L,
    buffer: &mut [u8],
    length: usize,
    mode: Mode,
) -> Result<usize> {
    receive_bytes_until(link, &mut Reassembler::new(mode, None), buffer, length, None)
}
