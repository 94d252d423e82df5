use std::collections::VecDeque;

use bitflags::bitflags;
use tracing::warn;

use super::LinkAdapter;
use crate::error::{CtpError, Result};
use crate::types::{Config, Port, RawFrame, MAX_FRAME_LEN};

/// CAN configuration
#[derive(Debug, Clone)]
pub struct CanConfig {
    pub bitrate: u32,
    pub sample_point: f32,
    pub sjw: u8,
    pub options: CanOptions,
}

/// CAN bitrate configurations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanBitrate {
    Rate1M,               // 1Mbit/sec, 75% sample point
    Rate500K,             // 500kbit/sec, 75% sample point
    Rate250K,             // 250kbit/sec, 75% sample point
    Rate125K,             // 125kbit/sec, 75% sample point
    Rate100K,             // 100kbit/sec, 75% sample point
    Custom(u32, f32, u8), // Custom bitrate, sample point, and SJW
}

impl CanBitrate {
    /// Maps a baud rate given in kbit/s to a standard profile
    pub fn from_kbaud(kbaud: u32) -> Result<Self> {
        match kbaud {
            1000 => Ok(CanBitrate::Rate1M),
            500 => Ok(CanBitrate::Rate500K),
            250 => Ok(CanBitrate::Rate250K),
            125 => Ok(CanBitrate::Rate125K),
            100 => Ok(CanBitrate::Rate100K),
            _ => {
                warn!(kbaud, "unsupported CAN baud rate");
                Err(CtpError::InvalidParameter)
            }
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CanOptions: u32 {
        const NONE = 0;
        /// Transmitted frames are also delivered to the local receiver
        const LOOPBACK = 1;
        /// Controller never transmits
        const LISTEN_ONLY = 2;
        /// Frames longer than 8 bytes are accepted (CAN FD)
        const FD = 4;
        /// Disables automatic retransmission after a failed write
        const ONE_SHOT = 8;
    }
}

impl Default for CanConfig {
    fn default() -> Self {
        Self {
            bitrate: 250_000,
            sample_point: 0.75,
            sjw: 1,
            options: CanOptions::NONE,
        }
    }
}

impl Config for CanConfig {
    fn validate(&self) -> Result<()> {
        if self.bitrate == 0 {
            return Err(CtpError::InvalidParameter);
        }
        if self.sample_point <= 0.0 || self.sample_point >= 1.0 {
            return Err(CtpError::InvalidParameter);
        }
        if self.sjw == 0 {
            return Err(CtpError::InvalidParameter);
        }
        Ok(())
    }
}

const RX_QUEUE_SIZE: usize = 128;
const TX_RETRIES: usize = 2;
const CLASSIC_FRAME_LEN: usize = 8;

/// Bounded FIFO of frames
#[derive(Debug)]
struct FrameQueue {
    frames: VecDeque<RawFrame>,
    limit: usize,
}

impl FrameQueue {
    fn new(limit: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(limit),
            limit,
        }
    }

    fn push(&mut self, frame: RawFrame) -> Result<()> {
        if self.is_full() {
            return Err(CtpError::BufferFull);
        }
        self.frames.push_back(frame);
        Ok(())
    }

    fn is_full(&self) -> bool {
        self.frames.len() >= self.limit
    }

    fn pop(&mut self) -> Option<RawFrame> {
        self.frames.pop_front()
    }

    fn len(&self) -> usize {
        self.frames.len()
    }
}

/// CAN controller shell driving a platform port
pub struct CanLink<P: Port> {
    config: CanConfig,
    port: P,
    is_open: bool,
    rx_queue: FrameQueue,
    error_counters: (u8, u8), // (TEC, REC)
}

impl<P: Port> CanLink<P> {
    /// Creates a new CAN link with the given port
    pub fn with_port(config: CanConfig, port: P) -> Self {
        Self {
            config,
            port,
            is_open: false,
            rx_queue: FrameQueue::new(RX_QUEUE_SIZE),
            error_counters: (0, 0),
        }
    }

    /// Configure CAN controller with standard bitrate profile
    pub fn with_bitrate(port: P, bitrate: CanBitrate, options: CanOptions) -> Self {
        let (rate, sample_point, sjw) = match bitrate {
            CanBitrate::Rate1M => (1_000_000, 0.75, 1),
            CanBitrate::Rate500K => (500_000, 0.75, 1),
            CanBitrate::Rate250K => (250_000, 0.75, 1),
            CanBitrate::Rate125K => (125_000, 0.75, 1),
            CanBitrate::Rate100K => (100_000, 0.75, 1),
            CanBitrate::Custom(rate, sp, s) => (rate, sp, s),
        };

        let config = CanConfig {
            bitrate: rate,
            sample_point,
            sjw,
            options,
        };

        Self::with_port(config, port)
    }

    pub fn open(&mut self) -> Result<()> {
        if self.is_open {
            return Ok(());
        }

        self.config.validate()?;
        self.is_open = true;
        Ok(())
    }

    pub fn close(&mut self) {
        self.is_open = false;
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn config(&self) -> &CanConfig {
        &self.config
    }

    /// Get current error counters (TEC, REC)
    pub fn get_error_counters(&self) -> (u8, u8) {
        self.error_counters
    }

    /// Get number of frames pending in RX queue
    pub fn rx_pending(&self) -> usize {
        self.rx_queue.len()
    }

    /// Gives access to the underlying port
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    fn fits(&self, frame: &RawFrame) -> bool {
        let len = frame.len as usize;
        if self.config.options.contains(CanOptions::FD) {
            len <= MAX_FRAME_LEN
        } else {
            !frame.is_fd && len <= CLASSIC_FRAME_LEN
        }
    }

    fn bump_tec(&mut self) {
        self.error_counters.0 = self.error_counters.0.saturating_add(1);
    }

    fn bump_rec(&mut self) {
        self.error_counters.1 = self.error_counters.1.saturating_add(1);
    }

    fn write(&mut self, frame: &RawFrame) -> Result<()> {
        let retries = if self.config.options.contains(CanOptions::ONE_SHOT) {
            0
        } else {
            TX_RETRIES
        };

        let mut attempt = 0;
        loop {
            match self.port.write(frame) {
                Ok(()) => return Ok(()),
                Err(err) if attempt < retries => {
                    self.bump_tec();
                    warn!(id = frame.id, attempt, %err, "CAN write failed, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// A full RX queue drops the echo; the frame itself already left on the bus.
    fn echo(&mut self, frame: &RawFrame) {
        if let Err(err) = self.rx_queue.push(*frame) {
            warn!(id = frame.id, %err, "dropping loopback echo");
        }
    }
}

impl<P: Port> LinkAdapter for CanLink<P> {
    fn transmit(&mut self, frame: &RawFrame) -> bool {
        if !self.is_open || self.config.options.contains(CanOptions::LISTEN_ONLY) {
            return false;
        }
        if !self.fits(frame) {
            warn!(id = frame.id, len = frame.len, "frame exceeds link payload");
            return false;
        }

        match self.write(frame) {
            Ok(()) => {
                if self.config.options.contains(CanOptions::LOOPBACK) {
                    self.echo(frame);
                }
                true
            }
            Err(err) => {
                self.bump_tec();
                warn!(id = frame.id, %err, "CAN transmit failed");
                false
            }
        }
    }

    fn poll_receive(&mut self) -> Option<RawFrame> {
        if !self.is_open {
            return None;
        }

        // Check RX queue first
        if let Some(frame) = self.rx_queue.pop() {
            return Some(frame);
        }

        match self.port.read() {
            Ok(Some(frame)) if self.fits(&frame) => Some(frame),
            Ok(Some(frame)) => {
                self.bump_rec();
                warn!(id = frame.id, len = frame.len, "dropping oversized frame");
                None
            }
            Ok(None) => None,
            Err(err) => {
                self.bump_rec();
                warn!(%err, "CAN receive failed");
                None
            }
        }
    }
}
