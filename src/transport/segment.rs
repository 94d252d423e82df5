//! Segmentation engine.
//!
//! A transfer is one START frame, zero or more CONSECUTIVE frames with
//! sequence numbers counting up from 0, and one END frame carrying whatever
//! is left once it fits in END capacity. Payloads that fit entirely in the
//! START frame are a single frame.

use tracing::{debug, trace};

use super::frame::{encode, LogicalFrame};
use super::mode::Mode;
use crate::error::{CtpError, Result};
use crate::physical::LinkAdapter;
use crate::types::{CanId, RawFrame};

/// Yields the raw frames of one transfer, in transmit order.
#[derive(Debug, Clone)]
pub struct Segmenter<'a> {
    id: CanId,
    data: &'a [u8],
    mode: Mode,
    offset: usize,
    sequence: u8,
    started: bool,
    done: bool,
}

impl<'a> Segmenter<'a> {
    /// Fails with `PayloadTooLarge` if `data` does not fit one transfer.
    pub fn new(id: CanId, data: &'a [u8], mode: Mode) -> Result<Self> {
        let max = mode.max_transfer_len();
        if data.len() > max {
            return Err(CtpError::PayloadTooLarge {
                len: data.len(),
                max,
            });
        }
        Ok(Self {
            id,
            data,
            mode,
            offset: 0,
            sequence: 0,
            started: false,
            done: false,
        })
    }

    /// Bytes not yet handed out in a frame
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn emit(&self, frame: LogicalFrame<'_>) -> RawFrame {
        trace!(id = self.id, %frame, "tx");
        encode(self.id, &frame, self.mode)
    }
}

impl Iterator for Segmenter<'_> {
    type Item = RawFrame;

    fn next(&mut self) -> Option<RawFrame> {
        if self.done {
            return None;
        }

        if !self.started {
            let data = self.data;
            let chunk = data.len().min(self.mode.start_capacity());
            self.started = true;
            self.offset = chunk;
            self.done = chunk == data.len();
            return Some(self.emit(LogicalFrame::Start {
                total_length: data.len() as u16,
                data: &data[..chunk],
            }));
        }

        let data = self.data;
        let rest = &data[self.offset..];
        if rest.len() <= self.mode.end_capacity() {
            self.offset = self.data.len();
            self.done = true;
            return Some(self.emit(LogicalFrame::End { data: rest }));
        }

        let chunk = &rest[..self.mode.consecutive_capacity()];
        let frame = self.emit(LogicalFrame::Consecutive {
            sequence: self.sequence,
            data: chunk,
        });
        self.offset += chunk.len();
        self.sequence = self.sequence.wrapping_add(1);
        Some(frame)
    }
}

/// Sends `data` as a single START..END transfer.
///
/// Returns the number of payload bytes sent, always `data.len()` on success.
/// A link failure aborts the transfer with `LinkTransmitFailure`; nothing is retried.
pub fn send_transfer<L: LinkAdapter>(
    link: &mut L,
    id: CanId,
    data: &[u8],
    mode: Mode,
) -> Result<usize> {
    let segmenter = Segmenter::new(id, data, mode)?;
    debug!(id, len = data.len(), ?mode, "sending transfer");

    for frame in segmenter {
        if !link.transmit(&frame) {
            return Err(CtpError::LinkTransmitFailure { id });
        }
    }
    Ok(data.len())
}

/// Sends `data` of any length as back-to-back transfers of at most
/// `mode.max_transfer_len()` bytes. Each transfer restarts its sequence at 0.
///
/// An empty payload still sends one empty START so the peer's receive completes.
pub fn send<L: LinkAdapter>(link: &mut L, id: CanId, data: &[u8], mode: Mode) -> Result<usize> {
    if data.is_empty() {
        return send_transfer(link, id, data, mode);
    }

    let mut sent = 0;
    for chunk in data.chunks(mode.max_transfer_len()) {
        sent += send_transfer(link, id, chunk, mode)?;
    }
    Ok(sent)
}
